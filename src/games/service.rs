use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{new_id, now, with_conn, with_tx, DbState};
use crate::error::{AppError, AppResult};
use crate::games::models::*;
use crate::validation::ensure_valid;

pub struct GameService;

impl GameService {
    pub(crate) fn fetch(conn: &Connection, id: &str) -> AppResult<Game> {
        conn.query_row(
            &format!("SELECT {} FROM games WHERE id = ?1", GAME_COLUMNS),
            params![id],
            game_from_row,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Game"))
    }

    fn ensure_slug_free(conn: &Connection, slug: &str, except_id: Option<&str>) -> AppResult<()> {
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM games WHERE slug = ?1 AND (?2 IS NULL OR id != ?2)",
                params![slug, except_id],
                |row| row.get(0),
            )
            .optional()?;
        match existing {
            Some(_) => Err(AppError::invalid("name", "A game with this name already exists")),
            None => Ok(()),
        }
    }

    pub fn create(db: &DbState, form: GameForm) -> AppResult<Game> {
        ensure_valid(&form)?;
        let slug = form.slug();

        let game = with_tx(db, |tx| {
            Self::ensure_slug_free(tx, &slug, None)?;
            let id = new_id();
            let ts = now();
            tx.execute(
                "INSERT INTO games (id, name, slug, image_path, active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![id, form.name.trim(), slug, form.image_path, form.active, ts],
            )?;
            Self::fetch(tx, &id)
        })?;

        log::info!("[games] Created game '{}' ({})", game.name, game.id);
        Ok(game)
    }

    /// Returns the updated game and, when the image changed, the path it replaced.
    pub fn update(db: &DbState, id: &str, form: GameForm) -> AppResult<(Game, Option<String>)> {
        ensure_valid(&form)?;
        let slug = form.slug();

        with_tx(db, |tx| {
            let previous = Self::fetch(tx, id)?;
            Self::ensure_slug_free(tx, &slug, Some(id))?;
            tx.execute(
                "UPDATE games SET name = ?1, slug = ?2, image_path = ?3, active = ?4, updated_at = ?5 WHERE id = ?6",
                params![form.name.trim(), slug, form.image_path, form.active, now(), id],
            )?;

            let replaced = previous.image_path.filter(|old| form.image_path.as_ref() != Some(old));
            Ok((Self::fetch(tx, id)?, replaced))
        })
    }

    /// Delete a game no tournament refers to. Returns the game so its image can be removed.
    pub fn delete(db: &DbState, id: &str) -> AppResult<Game> {
        let game = with_tx(db, |tx| {
            let game = Self::fetch(tx, id)?;
            let tournaments: i64 = tx.query_row(
                "SELECT COUNT(*) FROM tournaments WHERE game_id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            if tournaments > 0 {
                return Err(AppError::Conflict(format!(
                    "'{}' is used by {} tournament(s); deactivate it instead",
                    game.name, tournaments
                )));
            }
            tx.execute("DELETE FROM games WHERE id = ?1", params![id])?;
            Ok(game)
        })?;

        log::info!("[games] Deleted game '{}'", game.name);
        Ok(game)
    }

    pub fn get(db: &DbState, id: &str) -> AppResult<Game> {
        with_conn(db, |conn| Self::fetch(conn, id))
    }

    pub fn list(db: &DbState, active_only: bool) -> AppResult<Vec<Game>> {
        with_conn(db, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM games WHERE (?1 = 0 OR active = 1) ORDER BY name COLLATE NOCASE",
                GAME_COLUMNS
            ))?;
            let games = stmt
                .query_map(params![active_only], game_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(games)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::insert_tournament;
    use crate::db::core::test_state;

    fn form(name: &str) -> GameForm {
        GameForm {
            name: name.to_string(),
            image_path: None,
            active: true,
        }
    }

    #[test]
    fn test_create_derives_slug() {
        let db = test_state();
        let game = GameService::create(&db, form("  Free Fire MAX ")).unwrap();
        assert_eq!(game.name, "Free Fire MAX");
        assert_eq!(game.slug, "free-fire-max");
        assert_eq!(GameService::get(&db, &game.id).unwrap(), game);
    }

    #[test]
    fn test_duplicate_slug_rejected() {
        let db = test_state();
        GameService::create(&db, form("Valorant")).unwrap();
        let result = GameService::create(&db, form("VALORANT!"));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_name_length() {
        let db = test_state();
        assert!(matches!(
            GameService::create(&db, form("X")),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            GameService::create(&db, form("!!!")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_update_reports_replaced_image() {
        let db = test_state();
        let mut f = form("BGMI");
        f.image_path = Some("games/old.png".to_string());
        let game = GameService::create(&db, f.clone()).unwrap();

        let (same, replaced) = GameService::update(&db, &game.id, f.clone()).unwrap();
        assert_eq!(replaced, None);
        assert_eq!(same.image_path.as_deref(), Some("games/old.png"));

        f.image_path = Some("games/new.png".to_string());
        f.active = false;
        let (updated, replaced) = GameService::update(&db, &game.id, f).unwrap();
        assert_eq!(replaced.as_deref(), Some("games/old.png"));
        assert!(!updated.active);
    }

    #[test]
    fn test_list_active_only() {
        let db = test_state();
        GameService::create(&db, form("Zeta")).unwrap();
        let mut hidden = form("Alpha");
        hidden.active = false;
        GameService::create(&db, hidden).unwrap();

        let all: Vec<String> = GameService::list(&db, false).unwrap().into_iter().map(|g| g.name).collect();
        assert_eq!(all, vec!["Alpha", "Zeta"]);
        assert_eq!(GameService::list(&db, true).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_refused_while_in_use() {
        let db = test_state();
        insert_tournament(&db, "t1", 0, 8);
        assert!(matches!(
            GameService::delete(&db, "g1"),
            Err(AppError::Conflict(_))
        ));

        let unused = GameService::create(&db, form("Chess")).unwrap();
        GameService::delete(&db, &unused.id).unwrap();
        assert!(matches!(
            GameService::get(&db, &unused.id),
            Err(AppError::NotFound(_))
        ));
    }
}
