use rusqlite::{params, Connection, OptionalExtension};

use crate::constants::page_limit;
use crate::db::{now, with_conn, with_tx, DbState};
use crate::error::{AppError, AppResult};
use crate::users::models::*;
use crate::validation::ensure_valid;
use crate::wallet::{Transaction, TransactionKind, WalletService};

pub struct UserService;

impl UserService {
    pub(crate) fn fetch_profile(conn: &Connection, user_id: &str) -> AppResult<UserProfile> {
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", PROFILE_COLUMNS),
            params![user_id],
            profile_from_row,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("User"))
    }

    pub fn get_profile(db: &DbState, user_id: &str) -> AppResult<UserProfile> {
        with_conn(db, |conn| Self::fetch_profile(conn, user_id))
    }

    /// Return the profile for an authenticated account, creating it on first sign-in.
    ///
    /// Accounts listed as admins are promoted every time so a config change takes effect
    /// on the next sign-in. Admins are never demoted here.
    pub fn ensure_profile(db: &DbState, new: NewProfile) -> AppResult<UserProfile> {
        with_tx(db, |tx| {
            match Self::fetch_profile(tx, &new.id) {
                Ok(mut existing) => {
                    if new.is_admin && !existing.is_admin() {
                        tx.execute(
                            "UPDATE users SET role = 'admin', updated_at = ?1 WHERE id = ?2",
                            params![now(), new.id],
                        )?;
                        existing.role = Role::Admin;
                        log::info!("[users] Promoted {} to admin", existing.email);
                    }
                    return Ok(existing);
                }
                Err(AppError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }

            let username = Self::unique_username(tx, &new.username_hint)?;
            let role = if new.is_admin { Role::Admin } else { Role::User };
            let ts = now();
            tx.execute(
                "INSERT INTO users (id, email, username, role, balance, banned, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, 0, ?5, ?5)",
                params![new.id, new.email.trim().to_lowercase(), username, role.as_str(), ts],
            )?;
            log::info!("[users] Created profile '{}' for {}", username, new.id);
            Self::fetch_profile(tx, &new.id)
        })
    }

    // "Ace Player!" -> "ace_player", then "ace_player2", "ace_player3", ...
    fn unique_username(conn: &Connection, hint: &str) -> AppResult<String> {
        let mut base: String = hint
            .trim()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        base = base.trim_matches('_').chars().take(20).collect();
        if base.chars().count() < 3 {
            base = format!("player_{}", base);
        }

        let mut candidate = base.clone();
        let mut suffix = 2;
        while Self::username_taken(conn, &candidate, None)? {
            candidate = format!("{}{}", base, suffix);
            suffix += 1;
        }
        Ok(candidate)
    }

    fn username_taken(conn: &Connection, username: &str, except_id: Option<&str>) -> AppResult<bool> {
        let found: Option<String> = conn
            .query_row(
                "SELECT id FROM users WHERE username = ?1 COLLATE NOCASE AND (?2 IS NULL OR id != ?2)",
                params![username, except_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn update_profile(db: &DbState, user_id: &str, request: UpdateProfileRequest) -> AppResult<UserProfile> {
        ensure_valid(&request)?;
        let username = request.username.trim().to_string();

        with_tx(db, |tx| {
            Self::fetch_profile(tx, user_id)?;
            if Self::username_taken(tx, &username, Some(user_id))? {
                return Err(AppError::Conflict(format!("Username '{}' is already taken", username)));
            }

            tx.execute(
                "UPDATE users SET username = ?1, display_name = ?2, in_game_name = ?3, in_game_id = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    username,
                    trimmed(&request.display_name),
                    trimmed(&request.in_game_name),
                    trimmed(&request.in_game_id),
                    now(),
                    user_id,
                ],
            )?;
            Self::fetch_profile(tx, user_id)
        })
    }

    /// Point the profile at a stored image. Returns the previous path so the caller can delete it.
    pub fn set_avatar(db: &DbState, user_id: &str, avatar_path: Option<&str>) -> AppResult<Option<String>> {
        with_tx(db, |tx| {
            let previous = Self::fetch_profile(tx, user_id)?.avatar_path;
            tx.execute(
                "UPDATE users SET avatar_path = ?1, updated_at = ?2 WHERE id = ?3",
                params![avatar_path, now(), user_id],
            )?;
            Ok(previous)
        })
    }

    pub fn list_users(db: &DbState, filter: &UserFilter, offset: u32, limit: Option<u32>) -> AppResult<Vec<UserProfile>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        with_conn(db, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users
                 WHERE (?1 IS NULL OR lower(username) LIKE ?1 OR lower(email) LIKE ?1 OR lower(ifnull(display_name, '')) LIKE ?1)
                   AND (?2 IS NULL OR role = ?2)
                   AND (?3 IS NULL OR banned = ?3)
                 ORDER BY created_at DESC, rowid DESC LIMIT ?4 OFFSET ?5",
                PROFILE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(
                    params![
                        search,
                        filter.role.map(|r| r.as_str()),
                        filter.banned,
                        page_limit(limit),
                        offset
                    ],
                    profile_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn set_role(db: &DbState, actor_id: &str, user_id: &str, role: Role) -> AppResult<UserProfile> {
        if actor_id == user_id {
            return Err(AppError::Forbidden("You cannot change your own role".to_string()));
        }
        with_tx(db, |tx| {
            Self::fetch_profile(tx, user_id)?;
            tx.execute(
                "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3",
                params![role.as_str(), now(), user_id],
            )?;
            log::info!("[users] {} set role of {} to {}", actor_id, user_id, role.as_str());
            Self::fetch_profile(tx, user_id)
        })
    }

    pub fn set_banned(db: &DbState, actor_id: &str, user_id: &str, banned: bool) -> AppResult<UserProfile> {
        if actor_id == user_id {
            return Err(AppError::Forbidden("You cannot ban yourself".to_string()));
        }
        with_tx(db, |tx| {
            Self::fetch_profile(tx, user_id)?;
            tx.execute(
                "UPDATE users SET banned = ?1, updated_at = ?2 WHERE id = ?3",
                params![banned, now(), user_id],
            )?;
            log::info!("[users] {} set banned={} on {}", actor_id, banned, user_id);
            Self::fetch_profile(tx, user_id)
        })
    }

    /// Delete an account that has nothing outstanding: no team in a tournament that
    /// hasn't finished and no withdrawal waiting for review.
    pub fn delete_user(db: &DbState, actor_id: &str, user_id: &str) -> AppResult<()> {
        if actor_id == user_id {
            return Err(AppError::Forbidden("You cannot delete your own account here".to_string()));
        }
        with_tx(db, |tx| {
            Self::fetch_profile(tx, user_id)?;

            let active_teams: i64 = tx.query_row(
                "SELECT COUNT(*) FROM teams t JOIN tournaments tr ON tr.id = t.tournament_id
                 WHERE t.captain_id = ?1 AND tr.status IN ('upcoming', 'ongoing')",
                params![user_id],
                |row| row.get(0),
            )?;
            if active_teams > 0 {
                return Err(AppError::Conflict(
                    "User is registered in an active tournament".to_string(),
                ));
            }

            let pending: i64 = tx.query_row(
                "SELECT COUNT(*) FROM withdrawal_requests WHERE user_id = ?1 AND status = 'pending'",
                params![user_id],
                |row| row.get(0),
            )?;
            if pending > 0 {
                return Err(AppError::Conflict("User has a pending withdrawal".to_string()));
            }

            // Teams in finished tournaments stay for the bracket and champion; the
            // schema detaches their captain.
            tx.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
            log::info!("[users] {} deleted user {}", actor_id, user_id);
            Ok(())
        })
    }

    pub fn adjust_balance(
        db: &DbState,
        actor_id: &str,
        user_id: &str,
        adjustment: BalanceAdjustment,
    ) -> AppResult<Transaction> {
        ensure_valid(&adjustment)?;
        let transaction = with_tx(db, |tx| {
            WalletService::record(
                tx,
                user_id,
                TransactionKind::Adjustment,
                adjustment.amount,
                Some(actor_id),
                adjustment.note.trim(),
            )
        })?;
        log::info!("[users] {} adjusted balance of {} by {}", actor_id, user_id, adjustment.amount);
        WalletService::publish_balances(std::slice::from_ref(&transaction));
        Ok(transaction)
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
