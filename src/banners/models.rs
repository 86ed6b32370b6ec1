use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::validation::{FieldError, Rules, Validate};

/// Promotional slide on the home screen carousel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "banners.ts")]
pub struct Banner {
    pub id: String,
    pub title: String,
    pub image_path: String,
    pub link_url: Option<String>,
    pub active: bool,
    pub position: i64,
    pub created_at: String,
    pub updated_at: String,
}

pub(crate) const BANNER_COLUMNS: &str =
    "id, title, image_path, link_url, active, position, created_at, updated_at";

pub(crate) fn banner_from_row(row: &rusqlite::Row) -> rusqlite::Result<Banner> {
    Ok(Banner {
        id: row.get(0)?,
        title: row.get(1)?,
        image_path: row.get(2)?,
        link_url: row.get(3)?,
        active: row.get(4)?,
        position: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "banners.ts")]
pub struct BannerForm {
    pub title: String,
    pub image_path: String,
    pub link_url: Option<String>,
    pub active: bool,
}

impl Validate for BannerForm {
    fn validate(&self) -> Vec<FieldError> {
        let mut rules = Rules::new();
        rules
            .length_between("title", &self.title, 1, 80)
            .required("image_path", &self.image_path);
        if let Some(link) = self.link_url.as_deref().filter(|l| !l.trim().is_empty()) {
            rules.url("link_url", link);
        }
        rules.finish()
    }
}
