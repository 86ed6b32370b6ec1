use std::path::PathBuf;

use tauri::{AppHandle, Manager};

use crate::commands::current_admin;
use crate::db::{core::reset_database, DbState};
use crate::error::ServiceResult;

/// Where the open database lives, so it can be recreated.
pub struct DatabasePath(pub PathBuf);

/// Wipe every table and start over from an empty schema.
#[tauri::command]
pub async fn admin_reset_database(app: AppHandle) -> ServiceResult<()> {
  let db = app.state::<DbState>();
  let path = app.state::<DatabasePath>();
  current_admin(&app)
    .await
    .and_then(|admin| {
      log::warn!("[db] Database reset requested by {}", admin.id);
      reset_database(&db, &path.0)
    })
    .into()
}
