//! Session lookups shared by the `#[tauri::command]` handlers of every module.
//!
//! Handlers take an owned `AppHandle` and read managed state from it, so they can be
//! `async` and still return a plain `ServiceResult`.

use tauri::AppHandle;

use crate::auth::commands::AuthState;
use crate::auth::{signed_in, signed_in_admin};
use crate::error::AppResult;
use crate::users::UserProfile;

/// The signed-in profile. A session close to expiry is refreshed first.
pub(crate) async fn current_user(app: &AppHandle) -> AppResult<UserProfile> {
    let managed = AuthState::of(app);
    signed_in(&managed.ctx()).await
}

pub(crate) async fn current_admin(app: &AppHandle) -> AppResult<UserProfile> {
    let managed = AuthState::of(app);
    signed_in_admin(&managed.ctx()).await
}
