#[cfg(feature = "desktop")]
pub mod commands;
pub mod core;

pub use self::core::{initialize_database, open_in_memory, with_conn, with_tx, DbState};

/// Timestamp format stored in every `*_at` column.
pub fn now() -> String {
  chrono::Utc::now().to_rfc3339()
}

pub fn new_id() -> String {
  uuid::Uuid::new_v4().to_string()
}
