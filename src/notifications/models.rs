use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::validation::{FieldError, Rules, Validate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "notifications.ts")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
    /// Frontend route to open when the notification is clicked.
    pub link: Option<String>,
    pub read: bool,
    pub created_at: String,
}

/// Content of a notification before it is addressed to anyone.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "notifications.ts")]
pub struct NotificationDraft {
    pub title: String,
    pub body: String,
    pub link: Option<String>,
}

impl NotificationDraft {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

impl Validate for NotificationDraft {
    fn validate(&self) -> Vec<FieldError> {
        Rules::new()
            .length_between("title", &self.title, 1, 100)
            .length_between("body", &self.body, 1, 1000)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "notifications.ts")]
pub enum Audience {
    User { user_id: String },
    Tournament { tournament_id: String },
    Everyone,
}
