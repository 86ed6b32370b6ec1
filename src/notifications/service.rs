use rusqlite::{params, Connection, OptionalExtension};

use crate::constants::page_limit;
use crate::db::{new_id, now, with_conn, with_tx, DbState};
use crate::error::{AppError, AppResult};
use crate::events::{self, NotificationEvent, NOTIFICATION};
use crate::notifications::models::*;
use crate::validation::ensure_valid;

pub struct NotificationService;

impl NotificationService {
    /// Validate, address and store a notification, then push it to every recipient.
    /// Returns how many users received it.
    pub fn send(db: &DbState, audience: Audience, draft: NotificationDraft) -> AppResult<usize> {
        ensure_valid(&draft)?;

        let sent = with_tx(db, |tx| {
            let recipients = Self::resolve_audience(tx, &audience)?;
            Self::queue(tx, &recipients, &draft)
        })?;

        log::info!("[notifications] '{}' sent to {} user(s)", draft.title, sent.len());
        Self::publish_all(&sent);
        Ok(sent.len())
    }

    pub fn send_to_user(db: &DbState, user_id: &str, draft: NotificationDraft) -> AppResult<usize> {
        Self::send(db, Audience::User { user_id: user_id.to_string() }, draft)
    }

    pub fn send_to_tournament(db: &DbState, tournament_id: &str, draft: NotificationDraft) -> AppResult<usize> {
        Self::send(
            db,
            Audience::Tournament {
                tournament_id: tournament_id.to_string(),
            },
            draft,
        )
    }

    pub fn broadcast(db: &DbState, draft: NotificationDraft) -> AppResult<usize> {
        Self::send(db, Audience::Everyone, draft)
    }

    fn resolve_audience(conn: &Connection, audience: &Audience) -> AppResult<Vec<String>> {
        match audience {
            Audience::User { user_id } => {
                let exists: Option<String> = conn
                    .query_row("SELECT id FROM users WHERE id = ?1", params![user_id], |row| row.get(0))
                    .optional()?;
                exists
                    .map(|id| vec![id])
                    .ok_or_else(|| AppError::not_found("User"))
            }
            Audience::Tournament { tournament_id } => Self::tournament_recipients(conn, tournament_id),
            Audience::Everyone => {
                let mut stmt = conn.prepare("SELECT id FROM users WHERE banned = 0")?;
                let ids = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(ids)
            }
        }
    }

    /// Captains of every team registered in the tournament.
    pub(crate) fn tournament_recipients(conn: &Connection, tournament_id: &str) -> AppResult<Vec<String>> {
        let mut stmt = conn.prepare("SELECT captain_id FROM teams WHERE tournament_id = ?1 AND captain_id IS NOT NULL ORDER BY created_at")?;
        let ids = stmt
            .query_map(params![tournament_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Insert one notification per recipient using the caller's connection or transaction.
    /// Nothing is pushed to the frontend; call [`Self::publish_all`] after committing.
    pub(crate) fn queue(
        conn: &Connection,
        user_ids: &[String],
        draft: &NotificationDraft,
    ) -> AppResult<Vec<Notification>> {
        let created_at = now();
        let mut stmt = conn.prepare(
            "INSERT INTO notifications (id, user_id, title, body, link, read, created_at) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        )?;

        let mut sent = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            let notification = Notification {
                id: new_id(),
                user_id: user_id.clone(),
                title: draft.title.clone(),
                body: draft.body.clone(),
                link: draft.link.clone(),
                read: false,
                created_at: created_at.clone(),
            };
            stmt.execute(params![
                notification.id,
                notification.user_id,
                notification.title,
                notification.body,
                notification.link,
                notification.created_at,
            ])?;
            sent.push(notification);
        }
        Ok(sent)
    }

    pub(crate) fn publish_all(notifications: &[Notification]) {
        for notification in notifications {
            events::publish(
                NOTIFICATION,
                NotificationEvent {
                    user_id: notification.user_id.clone(),
                    notification: notification.clone(),
                },
            );
        }
    }

    pub fn list(
        db: &DbState,
        user_id: &str,
        unread_only: bool,
        offset: u32,
        limit: Option<u32>,
    ) -> AppResult<Vec<Notification>> {
        with_conn(db, |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, body, link, read, created_at FROM notifications
                 WHERE user_id = ?1 AND (?2 = 0 OR read = 0)
                 ORDER BY created_at DESC, rowid DESC LIMIT ?3 OFFSET ?4",
            )?;
            let rows = stmt
                .query_map(params![user_id, unread_only, page_limit(limit), offset], |row| {
                    Ok(Notification {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        title: row.get(2)?,
                        body: row.get(3)?,
                        link: row.get(4)?,
                        read: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn unread_count(db: &DbState, user_id: &str) -> AppResult<i64> {
        with_conn(db, |conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
                params![user_id],
                |row| row.get(0),
            )?)
        })
    }

    pub fn mark_read(db: &DbState, user_id: &str, notification_id: &str) -> AppResult<()> {
        with_conn(db, |conn| {
            let affected = conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
                params![notification_id, user_id],
            )?;
            if affected == 0 {
                return Err(AppError::not_found("Notification"));
            }
            Ok(())
        })
    }

    pub fn mark_all_read(db: &DbState, user_id: &str) -> AppResult<usize> {
        with_conn(db, |conn| {
            Ok(conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
                params![user_id],
            )?)
        })
    }

    pub fn delete(db: &DbState, user_id: &str, notification_id: &str) -> AppResult<()> {
        with_conn(db, |conn| {
            let affected = conn.execute(
                "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
                params![notification_id, user_id],
            )?;
            if affected == 0 {
                return Err(AppError::not_found("Notification"));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::core::test_state;
    use crate::test_support::{insert_team, insert_tournament, insert_user, set_banned};

    #[test]
    fn test_send_to_single_user() {
        let db = test_state();
        insert_user(&db, "u1", 0);

        let sent =
            NotificationService::send_to_user(&db, "u1", NotificationDraft::new("Welcome", "Thanks for joining")).unwrap();

        assert_eq!(sent, 1);
        assert_eq!(NotificationService::unread_count(&db, "u1").unwrap(), 1);
    }

    #[test]
    fn test_send_to_unknown_user_fails() {
        let db = test_state();
        let result = NotificationService::send(
            &db,
            Audience::User { user_id: "ghost".to_string() },
            NotificationDraft::new("Hi", "There"),
        );
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_broadcast_skips_banned_users() {
        let db = test_state();
        insert_user(&db, "u1", 0);
        insert_user(&db, "u2", 0);
        insert_user(&db, "u3", 0);
        set_banned(&db, "u3");

        let sent = NotificationService::broadcast(&db, NotificationDraft::new("Maintenance", "Back in an hour")).unwrap();

        assert_eq!(sent, 2);
        assert_eq!(NotificationService::unread_count(&db, "u3").unwrap(), 0);
    }

    #[test]
    fn test_send_to_tournament_reaches_registered_captains() {
        let db = test_state();
        for id in ["u1", "u2", "u3", "outsider"] {
            insert_user(&db, id, 0);
        }
        insert_tournament(&db, "t1", 0, 4);
        insert_tournament(&db, "t2", 0, 4);
        for id in ["u1", "u2", "u3"] {
            insert_team(&db, "t1", id);
        }
        insert_team(&db, "t2", "outsider");

        let sent = NotificationService::send_to_tournament(
            &db,
            "t1",
            NotificationDraft::new("Room is live", "Check the room credentials"),
        )
        .unwrap();

        assert_eq!(sent, 3);
        for id in ["u1", "u2", "u3"] {
            assert_eq!(NotificationService::unread_count(&db, id).unwrap(), 1);
        }
        assert_eq!(NotificationService::unread_count(&db, "outsider").unwrap(), 0);
    }

    #[test]
    fn test_empty_draft_is_rejected() {
        let db = test_state();
        insert_user(&db, "u1", 0);
        let result = NotificationService::send(
            &db,
            Audience::Everyone,
            NotificationDraft::new("", "body"),
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_mark_read_and_list_unread() {
        let db = test_state();
        insert_user(&db, "u1", 0);
        insert_user(&db, "u2", 0);
        for title in ["One", "Two"] {
            NotificationService::send(
                &db,
                Audience::User { user_id: "u1".to_string() },
                NotificationDraft::new(title, "body"),
            )
            .unwrap();
        }

        let all = NotificationService::list(&db, "u1", false, 0, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "Two");

        // Someone else's id is not found.
        assert!(NotificationService::mark_read(&db, "u2", &all[0].id).is_err());

        NotificationService::mark_read(&db, "u1", &all[0].id).unwrap();
        let unread = NotificationService::list(&db, "u1", true, 0, None).unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].title, "One");

        assert_eq!(NotificationService::mark_all_read(&db, "u1").unwrap(), 1);
        assert_eq!(NotificationService::unread_count(&db, "u1").unwrap(), 0);

        NotificationService::delete(&db, "u1", &all[1].id).unwrap();
        assert_eq!(NotificationService::list(&db, "u1", false, 0, None).unwrap().len(), 1);
    }
}
