use rand::seq::SliceRandom;
use rusqlite::{params, Connection, OptionalExtension};

use crate::bracket::{Bracket, BracketService, TeamRef};
use crate::constants::page_limit;
use crate::db::{new_id, now, with_conn, with_tx, DbState};
use crate::error::{AppError, AppResult};
use crate::events::{self, BracketUpdatedEvent, TournamentUpdatedEvent, BRACKET_UPDATED, TOURNAMENT_UPDATED};
use crate::games::GameService;
use crate::notifications::{Notification, NotificationDraft, NotificationService};
use crate::tournaments::models::*;
use crate::users::UserProfile;
use crate::validation::ensure_valid;
use crate::wallet::{Transaction, TransactionKind, WalletService};

pub struct TournamentService;

fn tournament_link(id: &str) -> String {
    format!("/tournaments/{}", id)
}

fn team_from_row(row: &rusqlite::Row) -> rusqlite::Result<Team> {
    let players_json: String = row.get(4)?;
    let players = serde_json::from_str(&players_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Team {
        id: row.get(0)?,
        tournament_id: row.get(1)?,
        name: row.get(2)?,
        captain_id: row.get(3)?,
        players,
        created_at: row.get(5)?,
    })
}

fn hide_room(mut tournament: Tournament) -> Tournament {
    tournament.room_code = None;
    tournament.room_password = None;
    tournament
}

impl TournamentService {
    pub(crate) fn fetch(conn: &Connection, id: &str) -> AppResult<Tournament> {
        conn.query_row(
            &format!("SELECT {} FROM tournaments WHERE id = ?1", TOURNAMENT_COLUMNS),
            params![id],
            tournament_from_row,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Tournament"))
    }

    fn registered_count(conn: &Connection, id: &str) -> AppResult<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM teams WHERE tournament_id = ?1",
            params![id],
            |row| row.get(0),
        )?)
    }

    /// Teams in registration order.
    pub(crate) fn teams_of(conn: &Connection, id: &str) -> AppResult<Vec<Team>> {
        let mut stmt = conn.prepare(
            "SELECT id, tournament_id, name, captain_id, players_json, created_at FROM teams
             WHERE tournament_id = ?1 ORDER BY created_at, rowid",
        )?;
        let teams = stmt
            .query_map(params![id], team_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(teams)
    }

    fn team_of_captain(conn: &Connection, id: &str, captain_id: &str) -> AppResult<Option<Team>> {
        Ok(conn
            .query_row(
                "SELECT id, tournament_id, name, captain_id, players_json, created_at FROM teams
                 WHERE tournament_id = ?1 AND captain_id = ?2",
                params![id, captain_id],
                team_from_row,
            )
            .optional()?)
    }

    pub(crate) fn publish_update(conn: &Connection, id: &str) {
        let snapshot = Self::fetch(conn, id).and_then(|t| Ok((t.status, Self::registered_count(conn, id)?)));
        match snapshot {
            Ok((status, registered_teams)) => events::publish(
                TOURNAMENT_UPDATED,
                TournamentUpdatedEvent {
                    tournament_id: id.to_string(),
                    status,
                    registered_teams,
                },
            ),
            Err(e) => log::warn!("[tournaments] Could not publish update for {}: {}", id, e),
        }
    }

    fn after_commit(db: &DbState, id: &str, transactions: &[Transaction], notifications: &[Notification]) {
        WalletService::publish_balances(transactions);
        NotificationService::publish_all(notifications);
        if let Err(e) = with_conn(db, |conn| {
            Self::publish_update(conn, id);
            Ok(())
        }) {
            log::warn!("[tournaments] {}", e);
        }
    }

    // ---- Browsing ----

    /// Tournaments ordered by start time. Room credentials are never included.
    pub fn list(
        db: &DbState,
        filter: &TournamentFilter,
        offset: u32,
        limit: Option<u32>,
    ) -> AppResult<Vec<TournamentSummary>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));
        let columns = TOURNAMENT_COLUMNS
            .split(", ")
            .map(|c| format!("t.{}", c))
            .collect::<Vec<_>>()
            .join(", ");

        with_conn(db, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {}, g.name, (SELECT COUNT(*) FROM teams WHERE tournament_id = t.id)
                 FROM tournaments t JOIN games g ON g.id = t.game_id
                 WHERE (?1 IS NULL OR t.game_id = ?1)
                   AND (?2 IS NULL OR t.status = ?2)
                   AND (?3 IS NULL OR lower(t.title) LIKE ?3)
                 ORDER BY t.start_time ASC, t.rowid ASC LIMIT ?4 OFFSET ?5",
                columns
            ))?;
            let rows = stmt
                .query_map(
                    params![
                        filter.game_id,
                        filter.status.map(|s| s.as_str()),
                        search,
                        page_limit(limit),
                        offset
                    ],
                    |row| {
                        Ok(TournamentSummary {
                            tournament: hide_room(tournament_from_row(row)?),
                            game_name: row.get(18)?,
                            registered_teams: row.get(19)?,
                        })
                    },
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Full view of one tournament. Room credentials are kept only for admins and
    /// for captains registered in it.
    pub fn get_detail(db: &DbState, id: &str, viewer: Option<&UserProfile>) -> AppResult<TournamentDetail> {
        with_conn(db, |conn| {
            let tournament = Self::fetch(conn, id)?;
            let game_name = GameService::fetch(conn, &tournament.game_id)?.name;
            let teams = Self::teams_of(conn, id)?;

            let my_team_id = viewer.and_then(|user| {
                teams
                    .iter()
                    .find(|team| team.captain_id.as_deref() == Some(user.id.as_str()))
                    .map(|team| team.id.clone())
            });
            let sees_room = my_team_id.is_some() || viewer.map(|u| u.is_admin()).unwrap_or(false);

            Ok(TournamentDetail {
                tournament: if sees_room { tournament } else { hide_room(tournament) },
                game_name,
                registered_teams: teams.len() as i64,
                teams,
                my_team_id,
            })
        })
    }

    /// Tournaments the user captains a team in, soonest first.
    pub fn list_joined(db: &DbState, user_id: &str) -> AppResult<Vec<Tournament>> {
        with_conn(db, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tournaments WHERE id IN (SELECT tournament_id FROM teams WHERE captain_id = ?1)
                 ORDER BY start_time ASC",
                TOURNAMENT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![user_id], tournament_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    // ---- Registration ----

    pub fn join(db: &DbState, user: &UserProfile, id: &str, request: JoinRequest) -> AppResult<Team> {
        ensure_valid(&request)?;

        let (team, transactions, notifications) = with_tx(db, |tx| {
            let tournament = Self::fetch(tx, id)?;
            if tournament.status != TournamentStatus::Upcoming {
                return Err(AppError::Conflict("Registration for this tournament is closed".to_string()));
            }
            if Self::registered_count(tx, id)? >= tournament.max_teams {
                return Err(AppError::Conflict("This tournament is full".to_string()));
            }
            if Self::team_of_captain(tx, id, &user.id)?.is_some() {
                return Err(AppError::Conflict("You have already joined this tournament".to_string()));
            }
            if request.players.len() as i64 != tournament.team_size {
                return Err(AppError::invalid(
                    "players",
                    format!("Exactly {} player(s) are required", tournament.team_size),
                ));
            }

            let team_name = request.team_name.trim().to_string();
            let name_taken: Option<String> = tx
                .query_row(
                    "SELECT id FROM teams WHERE tournament_id = ?1 AND name = ?2 COLLATE NOCASE",
                    params![id, team_name],
                    |row| row.get(0),
                )
                .optional()?;
            if name_taken.is_some() {
                return Err(AppError::invalid("team_name", "Team name is already taken"));
            }

            let mut transactions = Vec::new();
            if tournament.entry_fee > 0 {
                transactions.push(WalletService::record(
                    tx,
                    &user.id,
                    TransactionKind::EntryFee,
                    -tournament.entry_fee,
                    Some(id),
                    &format!("Entry fee: {}", tournament.title),
                )?);
            }

            let team = Team {
                id: new_id(),
                tournament_id: id.to_string(),
                name: team_name,
                captain_id: Some(user.id.clone()),
                players: request.players.iter().map(|p| p.trim().to_string()).collect(),
                created_at: now(),
            };
            tx.execute(
                "INSERT INTO teams (id, tournament_id, name, captain_id, players_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    team.id,
                    team.tournament_id,
                    team.name,
                    team.captain_id,
                    serde_json::to_string(&team.players)?,
                    team.created_at,
                ],
            )?;

            let draft = NotificationDraft::new(
                "Registration confirmed",
                format!("{} is registered for {}.", team.name, tournament.title),
            )
            .with_link(tournament_link(id));
            let notifications = NotificationService::queue(tx, &[user.id.clone()], &draft)?;
            Ok((team, transactions, notifications))
        })?;

        log::info!("[tournaments] Team '{}' joined {}", team.name, id);
        Self::after_commit(db, id, &transactions, &notifications);
        Ok(team)
    }

    /// Withdraw the user's team before the tournament starts and refund the entry fee.
    pub fn leave(db: &DbState, user_id: &str, id: &str) -> AppResult<()> {
        let transactions = with_tx(db, |tx| {
            let tournament = Self::fetch(tx, id)?;
            if tournament.status != TournamentStatus::Upcoming {
                return Err(AppError::Conflict(
                    "Teams can only leave before the tournament starts".to_string(),
                ));
            }
            let team = Self::team_of_captain(tx, id, user_id)?
                .ok_or_else(|| AppError::not_found("Registration"))?;

            tx.execute("DELETE FROM teams WHERE id = ?1", params![team.id])?;

            let mut transactions = Vec::new();
            if tournament.entry_fee > 0 {
                transactions.push(WalletService::record(
                    tx,
                    user_id,
                    TransactionKind::Refund,
                    tournament.entry_fee,
                    Some(id),
                    &format!("Left {}", tournament.title),
                )?);
            }
            Ok(transactions)
        })?;

        log::info!("[tournaments] {} left {}", user_id, id);
        Self::after_commit(db, id, &transactions, &[]);
        Ok(())
    }

    // ---- Administration ----

    pub fn create(db: &DbState, admin_id: &str, form: TournamentForm) -> AppResult<Tournament> {
        ensure_valid(&form)?;

        let tournament = with_tx(db, |tx| {
            GameService::fetch(tx, &form.game_id).map_err(|_| AppError::invalid("game_id", "Unknown game"))?;

            let id = new_id();
            let ts = now();
            tx.execute(
                "INSERT INTO tournaments (id, title, game_id, description, rules, image_path, entry_fee, prize_pool,
                                          max_teams, team_size, status, start_time, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'upcoming', ?11, ?12, ?13, ?13)",
                params![
                    id,
                    form.title.trim(),
                    form.game_id,
                    form.description,
                    form.rules,
                    form.image_path,
                    form.entry_fee,
                    form.prize_pool,
                    form.max_teams,
                    form.team_size,
                    form.start_time,
                    admin_id,
                    ts,
                ],
            )?;
            Self::fetch(tx, &id)
        })?;

        log::info!("[tournaments] {} created '{}' ({})", admin_id, tournament.title, tournament.id);
        Ok(tournament)
    }

    /// Edit a tournament. Once teams have paid, the fee, team size and game are fixed, and
    /// once a bracket exists the capacity is fixed too. Returns the image path replaced, if any.
    pub fn update(db: &DbState, id: &str, form: TournamentForm) -> AppResult<(Tournament, Option<String>)> {
        ensure_valid(&form)?;

        let (tournament, replaced) = with_tx(db, |tx| {
            let current = Self::fetch(tx, id)?;
            if !current.status.is_active() {
                return Err(AppError::Conflict(format!(
                    "A {} tournament can no longer be edited",
                    current.status.as_str()
                )));
            }
            GameService::fetch(tx, &form.game_id).map_err(|_| AppError::invalid("game_id", "Unknown game"))?;

            let registered = Self::registered_count(tx, id)?;
            if registered > 0 {
                if form.entry_fee != current.entry_fee {
                    return Err(AppError::invalid("entry_fee", "Teams have already paid the entry fee"));
                }
                if form.team_size != current.team_size {
                    return Err(AppError::invalid("team_size", "Teams have already registered"));
                }
                if form.game_id != current.game_id {
                    return Err(AppError::invalid("game_id", "Teams have already registered"));
                }
                if form.max_teams < registered {
                    return Err(AppError::invalid(
                        "max_teams",
                        format!("{} teams are already registered", registered),
                    ));
                }
            }
            if current.status == TournamentStatus::Ongoing && form.max_teams != current.max_teams {
                return Err(AppError::invalid("max_teams", "The bracket has already been drawn"));
            }

            tx.execute(
                "UPDATE tournaments SET title = ?1, game_id = ?2, description = ?3, rules = ?4, image_path = ?5,
                        entry_fee = ?6, prize_pool = ?7, max_teams = ?8, team_size = ?9, start_time = ?10, updated_at = ?11
                 WHERE id = ?12",
                params![
                    form.title.trim(),
                    form.game_id,
                    form.description,
                    form.rules,
                    form.image_path,
                    form.entry_fee,
                    form.prize_pool,
                    form.max_teams,
                    form.team_size,
                    form.start_time,
                    now(),
                    id,
                ],
            )?;

            let replaced = current.image_path.filter(|old| form.image_path.as_ref() != Some(old));
            Ok((Self::fetch(tx, id)?, replaced))
        })?;

        log::info!("[tournaments] Updated '{}'", tournament.title);
        Self::after_commit(db, id, &[], &[]);
        Ok((tournament, replaced))
    }

    /// Remove an upcoming tournament nobody joined, or a cancelled one.
    pub fn delete(db: &DbState, id: &str) -> AppResult<Tournament> {
        let tournament = with_tx(db, |tx| {
            let tournament = Self::fetch(tx, id)?;
            let deletable = match tournament.status {
                TournamentStatus::Upcoming => Self::registered_count(tx, id)? == 0,
                TournamentStatus::Cancelled => true,
                _ => false,
            };
            if !deletable {
                return Err(AppError::Conflict(
                    "Only cancelled tournaments or upcoming ones without teams can be deleted".to_string(),
                ));
            }
            tx.execute("DELETE FROM tournaments WHERE id = ?1", params![id])?;
            Ok(tournament)
        })?;

        log::info!("[tournaments] Deleted '{}'", tournament.title);
        Ok(tournament)
    }

    pub fn set_room_credentials(db: &DbState, id: &str, credentials: RoomCredentials) -> AppResult<Tournament> {
        ensure_valid(&credentials)?;

        let (tournament, notifications) = with_tx(db, |tx| {
            let current = Self::fetch(tx, id)?;
            if !current.status.is_active() {
                return Err(AppError::Conflict("The tournament is already over".to_string()));
            }
            tx.execute(
                "UPDATE tournaments SET room_code = ?1, room_password = ?2, updated_at = ?3 WHERE id = ?4",
                params![credentials.room_code.trim(), credentials.room_password.trim(), now(), id],
            )?;

            let draft = NotificationDraft::new(
                "Room details available",
                format!("The room for {} is ready. Open the tournament to see the code.", current.title),
            )
            .with_link(tournament_link(id));
            let recipients = NotificationService::tournament_recipients(tx, id)?;
            let notifications = NotificationService::queue(tx, &recipients, &draft)?;
            Ok((Self::fetch(tx, id)?, notifications))
        })?;

        log::info!("[tournaments] Room credentials set for '{}'", tournament.title);
        NotificationService::publish_all(&notifications);
        Ok(tournament)
    }

    /// Cancel and refund every team's entry fee. Teams stay on record.
    pub fn cancel(db: &DbState, id: &str, reason: Option<String>) -> AppResult<Tournament> {
        let (tournament, transactions, notifications) = with_tx(db, |tx| {
            let current = Self::fetch(tx, id)?;
            if !current.status.is_active() {
                return Err(AppError::Conflict(format!(
                    "The tournament is already {}",
                    current.status.as_str()
                )));
            }

            let teams = Self::teams_of(tx, id)?;
            let mut transactions = Vec::new();
            if current.entry_fee > 0 {
                for captain_id in teams.iter().filter_map(|t| t.captain_id.as_deref()) {
                    transactions.push(WalletService::record(
                        tx,
                        captain_id,
                        TransactionKind::Refund,
                        current.entry_fee,
                        Some(id),
                        &format!("Refund: {} cancelled", current.title),
                    )?);
                }
            }

            tx.execute(
                "UPDATE tournaments SET status = 'cancelled', updated_at = ?1 WHERE id = ?2",
                params![now(), id],
            )?;

            let body = match reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
                Some(reason) => format!("{} was cancelled: {}", current.title, reason),
                None => format!("{} was cancelled.", current.title),
            };
            let body = if current.entry_fee > 0 {
                format!("{} Your entry fee has been refunded.", body)
            } else {
                body
            };
            let draft = NotificationDraft::new("Tournament cancelled", body).with_link(tournament_link(id));
            let captains: Vec<String> = teams.into_iter().filter_map(|t| t.captain_id).collect();
            let notifications = NotificationService::queue(tx, &captains, &draft)?;
            Ok((Self::fetch(tx, id)?, transactions, notifications))
        })?;

        log::info!(
            "[tournaments] Cancelled '{}', {} refund(s) issued",
            tournament.title,
            transactions.len()
        );
        Self::after_commit(db, id, &transactions, &notifications);
        Ok(tournament)
    }

    /// Close registration, draw the bracket and mark the tournament as ongoing.
    pub fn start(db: &DbState, id: &str, seeding: Seeding) -> AppResult<Bracket> {
        let (bracket, notifications) = with_tx(db, |tx| {
            let current = Self::fetch(tx, id)?;
            if current.status != TournamentStatus::Upcoming {
                return Err(AppError::Conflict(format!(
                    "Only upcoming tournaments can be started (this one is {})",
                    current.status.as_str()
                )));
            }

            let mut teams: Vec<TeamRef> = Self::teams_of(tx, id)?
                .into_iter()
                .map(|team| TeamRef {
                    id: team.id,
                    name: team.name,
                })
                .collect();
            if seeding == Seeding::Random {
                teams.shuffle(&mut rand::thread_rng());
            }

            let bracket = Bracket::generate(&teams)?;
            BracketService::store(tx, id, &bracket)?;
            tx.execute(
                "UPDATE tournaments SET status = 'ongoing', updated_at = ?1 WHERE id = ?2",
                params![now(), id],
            )?;

            let draft = NotificationDraft::new(
                "Tournament started",
                format!("{} has started. Check the bracket for your first match.", current.title),
            )
            .with_link(tournament_link(id));
            let recipients = NotificationService::tournament_recipients(tx, id)?;
            let notifications = NotificationService::queue(tx, &recipients, &draft)?;
            Ok((bracket, notifications))
        })?;

        log::info!(
            "[tournaments] Started {} with {} round(s)",
            id,
            bracket.rounds.len()
        );
        events::publish(
            BRACKET_UPDATED,
            BracketUpdatedEvent {
                tournament_id: id.to_string(),
                bracket: bracket.clone(),
            },
        );
        Self::after_commit(db, id, &[], &notifications);
        Ok(bracket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::core::test_state;
    use crate::test_support::{balance_of, count_rows, insert_admin, insert_game, insert_tournament, insert_user};
    use crate::users::UserService;

    fn profile(db: &DbState, id: &str) -> UserProfile {
        UserService::get_profile(db, id).unwrap()
    }

    fn join_as(db: &DbState, user_id: &str, tournament_id: &str, team_name: &str) -> AppResult<Team> {
        TournamentService::join(
            db,
            &profile(db, user_id),
            tournament_id,
            JoinRequest {
                team_name: team_name.to_string(),
                players: vec![format!("{}_ign", user_id)],
            },
        )
    }

    fn form(game_id: &str) -> TournamentForm {
        TournamentForm {
            title: "Weekend Clash".to_string(),
            game_id: game_id.to_string(),
            description: "Best of one".to_string(),
            rules: String::new(),
            image_path: None,
            entry_fee: 500,
            prize_pool: 5000,
            max_teams: 8,
            team_size: 1,
            start_time: "2030-01-01T10:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_join_debits_and_registers() {
        let db = test_state();
        insert_user(&db, "u1", 1000);
        insert_tournament(&db, "t1", 300, 4);

        let team = join_as(&db, "u1", "t1", "Wolves").unwrap();

        assert_eq!(team.players, vec!["u1_ign"]);
        assert_eq!(balance_of(&db, "u1"), 700);
        assert_eq!(NotificationService::unread_count(&db, "u1").unwrap(), 1);

        let detail = TournamentService::get_detail(&db, "t1", Some(&profile(&db, "u1"))).unwrap();
        assert_eq!(detail.registered_teams, 1);
        assert_eq!(detail.my_team_id, Some(team.id));
    }

    #[test]
    fn test_join_rules() {
        let db = test_state();
        for id in ["u1", "u2", "u3", "poor"] {
            insert_user(&db, id, if id == "poor" { 100 } else { 1000 });
        }
        insert_tournament(&db, "t1", 300, 2);

        join_as(&db, "u1", "t1", "Wolves").unwrap();
        assert!(matches!(join_as(&db, "u1", "t1", "Again"), Err(AppError::Conflict(_))));
        assert!(matches!(join_as(&db, "u2", "t1", "WOLVES"), Err(AppError::Validation(_))));
        assert!(matches!(
            join_as(&db, "poor", "t1", "Broke"),
            Err(AppError::InsufficientFunds { .. })
        ));
        assert_eq!(balance_of(&db, "poor"), 100);

        join_as(&db, "u2", "t1", "Bears").unwrap();
        assert!(matches!(join_as(&db, "u3", "t1", "Late"), Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_join_checks_team_size() {
        let db = test_state();
        insert_user(&db, "u1", 1000);
        insert_tournament(&db, "t1", 0, 4);
        let result = TournamentService::join(
            &db,
            &profile(&db, "u1"),
            "t1",
            JoinRequest {
                team_name: "Duo".to_string(),
                players: vec!["a".to_string(), "b".to_string()],
            },
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_leave_refunds() {
        let db = test_state();
        insert_user(&db, "u1", 1000);
        insert_tournament(&db, "t1", 300, 4);
        join_as(&db, "u1", "t1", "Wolves").unwrap();

        TournamentService::leave(&db, "u1", "t1").unwrap();

        assert_eq!(balance_of(&db, "u1"), 1000);
        assert_eq!(count_rows(&db, "SELECT COUNT(*) FROM teams"), 0);
        assert!(matches!(
            TournamentService::leave(&db, "u1", "t1"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_leave_refused_once_ongoing() {
        let db = test_state();
        insert_user(&db, "u1", 1000);
        insert_user(&db, "u2", 1000);
        insert_tournament(&db, "t1", 300, 4);
        join_as(&db, "u1", "t1", "Wolves").unwrap();
        join_as(&db, "u2", "t1", "Bears").unwrap();
        TournamentService::start(&db, "t1", Seeding::Registration).unwrap();

        assert!(matches!(
            TournamentService::leave(&db, "u1", "t1"),
            Err(AppError::Conflict(_))
        ));
        assert_eq!(balance_of(&db, "u1"), 700);
        assert_eq!(count_rows(&db, "SELECT COUNT(*) FROM teams"), 2);
    }

    #[test]
    fn test_corrupt_roster_is_an_error() {
        let db = test_state();
        insert_user(&db, "u1", 0);
        insert_tournament(&db, "t1", 0, 4);
        join_as(&db, "u1", "t1", "Wolves").unwrap();
        with_conn(&db, |conn| Ok(conn.execute("UPDATE teams SET players_json = 'oops'", [])?)).unwrap();

        let result = with_conn(&db, |conn| TournamentService::teams_of(conn, "t1"));
        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[test]
    fn test_room_credentials_visibility() {
        let db = test_state();
        insert_user(&db, "u1", 0);
        insert_user(&db, "u2", 0);
        insert_admin(&db, "admin");
        insert_tournament(&db, "t1", 0, 4);
        join_as(&db, "u1", "t1", "Wolves").unwrap();

        TournamentService::set_room_credentials(
            &db,
            "t1",
            RoomCredentials {
                room_code: "ROOM42".to_string(),
                room_password: "pw".to_string(),
            },
        )
        .unwrap();

        let code_for = |viewer: Option<&UserProfile>| {
            TournamentService::get_detail(&db, "t1", viewer).unwrap().tournament.room_code
        };
        assert_eq!(code_for(Some(&profile(&db, "u1"))).as_deref(), Some("ROOM42"));
        assert_eq!(code_for(Some(&profile(&db, "admin"))).as_deref(), Some("ROOM42"));
        assert_eq!(code_for(Some(&profile(&db, "u2"))), None);
        assert_eq!(code_for(None), None);

        let listed = TournamentService::list(&db, &TournamentFilter::default(), 0, None).unwrap();
        assert_eq!(listed[0].tournament.room_code, None);
        // Registration notice plus the room notice.
        assert_eq!(NotificationService::unread_count(&db, "u1").unwrap(), 2);
    }

    #[test]
    fn test_list_filters() {
        let db = test_state();
        insert_game(&db, "g2");
        let first = TournamentService::create(&db, "admin", form("g2")).unwrap();
        let mut later = form("g2");
        later.title = "Night Owls Cup".to_string();
        later.start_time = "2031-01-01T10:00:00+00:00".to_string();
        TournamentService::create(&db, "admin", later).unwrap();
        insert_tournament(&db, "other", 0, 4);

        let by_game = TournamentService::list(
            &db,
            &TournamentFilter {
                game_id: Some("g2".to_string()),
                ..Default::default()
            },
            0,
            None,
        )
        .unwrap();
        assert_eq!(by_game.len(), 2);
        assert_eq!(by_game[0].tournament.id, first.id);
        assert_eq!(by_game[0].game_name, "g2");

        let searched = TournamentService::list(
            &db,
            &TournamentFilter {
                search: Some("owls".to_string()),
                ..Default::default()
            },
            0,
            None,
        )
        .unwrap();
        assert_eq!(searched.len(), 1);
    }

    #[test]
    fn test_create_requires_known_game() {
        let db = test_state();
        assert!(matches!(
            TournamentService::create(&db, "admin", form("nope")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_update_freezes_paid_fields() {
        let db = test_state();
        insert_game(&db, "g2");
        insert_user(&db, "u1", 1000);
        let tournament = TournamentService::create(&db, "admin", form("g2")).unwrap();
        join_as(&db, "u1", &tournament.id, "Wolves").unwrap();

        let mut cheaper = form("g2");
        cheaper.entry_fee = 100;
        assert!(matches!(
            TournamentService::update(&db, &tournament.id, cheaper),
            Err(AppError::Validation(_))
        ));

        let mut renamed = form("g2");
        renamed.title = "Renamed Clash".to_string();
        renamed.prize_pool = 9000;
        let (updated, _) = TournamentService::update(&db, &tournament.id, renamed).unwrap();
        assert_eq!(updated.title, "Renamed Clash");
        assert_eq!(updated.prize_pool, 9000);
    }

    #[test]
    fn test_cancel_refunds_everyone() {
        let db = test_state();
        insert_user(&db, "u1", 1000);
        insert_user(&db, "u2", 1000);
        insert_tournament(&db, "t1", 300, 4);
        join_as(&db, "u1", "t1", "Wolves").unwrap();
        join_as(&db, "u2", "t1", "Bears").unwrap();

        let cancelled = TournamentService::cancel(&db, "t1", Some("Server outage".to_string())).unwrap();

        assert_eq!(cancelled.status, TournamentStatus::Cancelled);
        assert_eq!(balance_of(&db, "u1"), 1000);
        assert_eq!(balance_of(&db, "u2"), 1000);
        assert!(matches!(
            TournamentService::cancel(&db, "t1", None),
            Err(AppError::Conflict(_))
        ));
        TournamentService::delete(&db, "t1").unwrap();
        assert_eq!(count_rows(&db, "SELECT COUNT(*) FROM teams"), 0);
    }

    #[test]
    fn test_delete_rules() {
        let db = test_state();
        insert_user(&db, "u1", 0);
        insert_tournament(&db, "t1", 0, 4);
        insert_tournament(&db, "t2", 0, 4);
        join_as(&db, "u1", "t1", "Wolves").unwrap();

        assert!(matches!(TournamentService::delete(&db, "t1"), Err(AppError::Conflict(_))));
        TournamentService::delete(&db, "t2").unwrap();
    }

    #[test]
    fn test_start_draws_bracket() {
        let db = test_state();
        for id in ["u1", "u2", "u3"] {
            insert_user(&db, id, 0);
        }
        insert_tournament(&db, "t1", 0, 4);
        join_as(&db, "u1", "t1", "Alpha").unwrap();
        join_as(&db, "u2", "t1", "Bravo").unwrap();
        join_as(&db, "u3", "t1", "Charlie").unwrap();

        let bracket = TournamentService::start(&db, "t1", Seeding::Registration).unwrap();

        assert_eq!(bracket.rounds.len(), 2);
        let first = &bracket.rounds[0].matches[0];
        assert_eq!(first.team1.as_ref().map(|t| t.name.as_str()), Some("Alpha"));
        assert_eq!(first.team2.as_ref().map(|t| t.name.as_str()), Some("Bravo"));

        let detail = TournamentService::get_detail(&db, "t1", None).unwrap();
        assert_eq!(detail.tournament.status, TournamentStatus::Ongoing);
        assert!(matches!(join_as(&db, "u1", "t1", "Late"), Err(AppError::Conflict(_))));
        assert!(matches!(
            TournamentService::start(&db, "t1", Seeding::Random),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_start_needs_two_teams() {
        let db = test_state();
        insert_user(&db, "u1", 0);
        insert_tournament(&db, "t1", 0, 4);
        join_as(&db, "u1", "t1", "Alpha").unwrap();

        assert!(matches!(
            TournamentService::start(&db, "t1", Seeding::Random),
            Err(AppError::Bracket(_))
        ));
        let detail = TournamentService::get_detail(&db, "t1", None).unwrap();
        assert_eq!(detail.tournament.status, TournamentStatus::Upcoming);
    }
}
