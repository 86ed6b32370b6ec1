use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::bracket::Bracket;
use crate::notifications::models::Notification;
use crate::tournaments::models::TournamentStatus;

pub const NOTIFICATION: &str = "notification";
#[derive(Serialize, Deserialize, Clone, Debug, TS)]
#[ts(export, export_to = "events.ts")]
pub struct NotificationEvent {
  pub user_id: String,
  pub notification: Notification,
}

pub const BRACKET_UPDATED: &str = "bracket_updated";
#[derive(Serialize, Deserialize, Clone, Debug, TS)]
#[ts(export, export_to = "events.ts")]
pub struct BracketUpdatedEvent {
  pub tournament_id: String,
  pub bracket: Bracket,
}

pub const TOURNAMENT_UPDATED: &str = "tournament_updated";
#[derive(Serialize, Deserialize, Clone, Debug, TS)]
#[ts(export, export_to = "events.ts")]
pub struct TournamentUpdatedEvent {
  pub tournament_id: String,
  pub status: TournamentStatus,
  pub registered_teams: i64,
}

pub const BALANCE_CHANGED: &str = "balance_changed";
#[derive(Serialize, Deserialize, Clone, Debug, TS)]
#[ts(export, export_to = "events.ts")]
pub struct BalanceChangedEvent {
  pub user_id: String,
  pub balance: i64,
}

pub const UPLOAD_PROGRESS: &str = "upload_progress";
#[derive(Serialize, Deserialize, Clone, Debug, TS)]
#[ts(export, export_to = "events.ts")]
pub struct UploadProgressEvent {
  /// Chosen by the frontend so it can match progress to its upload widget.
  pub upload_id: String,
  pub bytes_transferred: i64,
  pub total_bytes: i64,
  pub percent: f64,
}

pub const AUTH_CHANGED: &str = "auth_changed";
#[derive(Serialize, Deserialize, Clone, Debug, TS)]
#[ts(export, export_to = "events.ts")]
pub struct AuthChangedEvent {
  /// `None` after sign-out.
  pub user_id: Option<String>,
}
