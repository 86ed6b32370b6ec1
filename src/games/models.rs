use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::validation::{slugify, FieldError, Rules, Validate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "games.ts")]
pub struct Game {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub image_path: Option<String>,
    /// Inactive games are hidden from players but keep their tournaments.
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub(crate) const GAME_COLUMNS: &str = "id, name, slug, image_path, active, created_at, updated_at";

pub(crate) fn game_from_row(row: &rusqlite::Row) -> rusqlite::Result<Game> {
    Ok(Game {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        image_path: row.get(3)?,
        active: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Body of both the create and the edit form.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "games.ts")]
pub struct GameForm {
    pub name: String,
    pub image_path: Option<String>,
    pub active: bool,
}

impl GameForm {
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

impl Validate for GameForm {
    fn validate(&self) -> Vec<FieldError> {
        Rules::new()
            .length_between("name", &self.name, 2, 60)
            .check("name", !self.slug().is_empty(), "Name must contain letters or digits")
            .finish()
    }
}
