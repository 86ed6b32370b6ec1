use tauri::{AppHandle, Manager, State};

use crate::auth::{AuthContext, AuthService, SessionState, SessionStore, SignInRequest, SignUpOutcome, SignUpRequest};
use crate::config::AppConfig;
use crate::db::DbState;
use crate::error::ServiceResult;
use crate::users::UserProfile;

/// Managed state the auth flows borrow from.
pub(crate) struct AuthState<'a> {
  db: State<'a, DbState>,
  config: State<'a, AppConfig>,
  store: State<'a, SessionStore>,
  session: State<'a, SessionState>,
}

impl<'a> AuthState<'a> {
  pub(crate) fn of(app: &'a AppHandle) -> Self {
    Self {
      db: app.state::<DbState>(),
      config: app.state::<AppConfig>(),
      store: app.state::<SessionStore>(),
      session: app.state::<SessionState>(),
    }
  }

  pub(crate) fn ctx(&self) -> AuthContext<'_> {
    AuthContext {
      db: &self.db,
      config: &self.config,
      store: &self.store,
      state: &self.session,
    }
  }
}

#[tauri::command]
pub async fn sign_up(app: AppHandle, request: SignUpRequest) -> ServiceResult<SignUpOutcome> {
  let managed = AuthState::of(&app);
  AuthService::sign_up(&managed.ctx(), request).await.into()
}

#[tauri::command]
pub async fn sign_in(app: AppHandle, request: SignInRequest) -> ServiceResult<UserProfile> {
  let managed = AuthState::of(&app);
  AuthService::sign_in(&managed.ctx(), request).await.into()
}

#[tauri::command]
pub async fn sign_out(app: AppHandle) -> ServiceResult<()> {
  let managed = AuthState::of(&app);
  AuthService::sign_out(&managed.ctx()).await.into()
}

#[tauri::command]
pub async fn get_current_user(app: AppHandle) -> ServiceResult<Option<UserProfile>> {
  let managed = AuthState::of(&app);
  AuthService::current_user(&managed.ctx()).await.into()
}

#[tauri::command]
pub async fn request_password_reset(app: AppHandle, email: String) -> ServiceResult<()> {
  AuthService::request_password_reset(&app.state::<AppConfig>(), &email)
    .await
    .into()
}

/// Called once at startup by `run()`.
pub(crate) async fn restore_on_launch(app: &AppHandle) {
  let managed = AuthState::of(app);
  match AuthService::restore_session(&managed.ctx()).await {
    Ok(Some(profile)) => log::info!("[auth] Welcome back, {}", profile.username),
    Ok(None) => log::info!("[auth] No stored session"),
    Err(e) => log::warn!("[auth] Session restore failed: {}", e),
  }
}
