use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension};

use crate::banners::models::*;
use crate::db::{new_id, now, with_conn, with_tx, DbState};
use crate::error::{AppError, AppResult};
use crate::validation::ensure_valid;

pub struct BannerService;

fn link_of(form: &BannerForm) -> Option<String> {
    form.link_url
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
}

impl BannerService {
    fn fetch(conn: &Connection, id: &str) -> AppResult<Banner> {
        conn.query_row(
            &format!("SELECT {} FROM banners WHERE id = ?1", BANNER_COLUMNS),
            params![id],
            banner_from_row,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Banner"))
    }

    /// New banners go to the end of the carousel.
    pub fn create(db: &DbState, form: BannerForm) -> AppResult<Banner> {
        ensure_valid(&form)?;
        let banner = with_tx(db, |tx| {
            let position: i64 = tx.query_row("SELECT COALESCE(MAX(position) + 1, 0) FROM banners", [], |row| {
                row.get(0)
            })?;
            let id = new_id();
            let ts = now();
            tx.execute(
                "INSERT INTO banners (id, title, image_path, link_url, active, position, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![id, form.title.trim(), form.image_path, link_of(&form), form.active, position, ts],
            )?;
            Self::fetch(tx, &id)
        })?;
        log::info!("[banners] Created banner '{}' at position {}", banner.title, banner.position);
        Ok(banner)
    }

    /// Returns the updated banner and the image path it replaced, if any.
    pub fn update(db: &DbState, id: &str, form: BannerForm) -> AppResult<(Banner, Option<String>)> {
        ensure_valid(&form)?;
        with_tx(db, |tx| {
            let previous = Self::fetch(tx, id)?;
            tx.execute(
                "UPDATE banners SET title = ?1, image_path = ?2, link_url = ?3, active = ?4, updated_at = ?5 WHERE id = ?6",
                params![form.title.trim(), form.image_path, link_of(&form), form.active, now(), id],
            )?;
            let replaced = Some(previous.image_path).filter(|old| *old != form.image_path);
            Ok((Self::fetch(tx, id)?, replaced))
        })
    }

    pub fn delete(db: &DbState, id: &str) -> AppResult<Banner> {
        let banner = with_tx(db, |tx| {
            let banner = Self::fetch(tx, id)?;
            tx.execute("DELETE FROM banners WHERE id = ?1", params![id])?;
            Ok(banner)
        })?;
        log::info!("[banners] Deleted banner '{}'", banner.title);
        Ok(banner)
    }

    pub fn list(db: &DbState, active_only: bool) -> AppResult<Vec<Banner>> {
        with_conn(db, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM banners WHERE (?1 = 0 OR active = 1) ORDER BY position, created_at",
                BANNER_COLUMNS
            ))?;
            let banners = stmt
                .query_map(params![active_only], banner_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(banners)
        })
    }

    /// Rewrite positions so they follow `ids`. The list must name every banner exactly once.
    pub fn reorder(db: &DbState, ids: &[String]) -> AppResult<Vec<Banner>> {
        let unique: HashSet<&String> = ids.iter().collect();
        if unique.len() != ids.len() {
            return Err(AppError::invalid("ids", "Each banner may appear only once"));
        }

        with_tx(db, |tx| {
            let total: i64 = tx.query_row("SELECT COUNT(*) FROM banners", [], |row| row.get(0))?;
            if total != ids.len() as i64 {
                return Err(AppError::invalid("ids", "Every banner must be included in the new order"));
            }

            let ts = now();
            let mut stmt = tx.prepare("UPDATE banners SET position = ?1, updated_at = ?2 WHERE id = ?3")?;
            for (position, id) in ids.iter().enumerate() {
                if stmt.execute(params![position as i64, ts, id])? == 0 {
                    return Err(AppError::not_found("Banner"));
                }
            }
            Ok(())
        })?;

        log::info!("[banners] Reordered {} banner(s)", ids.len());
        Self::list(db, false)
    }
}
