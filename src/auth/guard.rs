//! Role checks run at the top of every command that needs a signed-in user.

use crate::auth::service::{AuthContext, AuthService};
use crate::auth::types::Session;
use crate::db::DbState;
use crate::error::{AppError, AppResult};
use crate::users::{UserProfile, UserService};

/// The profile behind `session`, provided it is live and not banned.
pub fn require_user(db: &DbState, session: Option<&Session>) -> AppResult<UserProfile> {
  let session = session.ok_or(AppError::Unauthorized)?;
  if session.is_expired() {
    return Err(AppError::Unauthorized);
  }

  let profile = match UserService::get_profile(db, &session.user_id) {
    Ok(profile) => profile,
    Err(AppError::NotFound(_)) => return Err(AppError::Unauthorized),
    Err(e) => return Err(e),
  };
  if profile.banned {
    return Err(AppError::Forbidden("This account has been banned".to_string()));
  }
  Ok(profile)
}

pub fn require_admin(db: &DbState, session: Option<&Session>) -> AppResult<UserProfile> {
  let profile = require_user(db, session)?;
  if !profile.is_admin() {
    log::warn!("[auth] {} tried an admin action", profile.id);
    return Err(AppError::Forbidden("Admin access required".to_string()));
  }
  Ok(profile)
}

/// [`require_user`] against the app-wide session, refreshing it when it is about to lapse.
pub async fn signed_in(ctx: &AuthContext<'_>) -> AppResult<UserProfile> {
  let session = AuthService::live_session(ctx).await?;
  require_user(ctx.db, session.as_ref())
}

pub async fn signed_in_admin(ctx: &AuthContext<'_>) -> AppResult<UserProfile> {
  let session = AuthService::live_session(ctx).await?;
  require_admin(ctx.db, session.as_ref())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::auth::storage::SessionStore;
  use crate::auth::types::SessionState;
  use crate::config::AppConfig;
  use crate::db::core::test_state;
  use crate::test_support::{insert_admin, insert_user, serve_json_once, set_banned};

  fn session_for(user_id: &str, expires_at: i64) -> Session {
    Session {
      access_token: "access".to_string(),
      refresh_token: "refresh".to_string(),
      expires_at,
      user_id: user_id.to_string(),
      email: format!("{}@example.com", user_id),
    }
  }

  fn live(user_id: &str) -> Session {
    session_for(user_id, chrono::Utc::now().timestamp() + 3600)
  }

  #[test]
  fn test_require_user() {
    let db = test_state();
    insert_user(&db, "u1", 0);

    assert!(matches!(require_user(&db, None), Err(AppError::Unauthorized)));
    assert!(matches!(
      require_user(&db, Some(&session_for("u1", 1000))),
      Err(AppError::Unauthorized)
    ));
    assert!(matches!(
      require_user(&db, Some(&live("ghost"))),
      Err(AppError::Unauthorized)
    ));
    assert_eq!(require_user(&db, Some(&live("u1"))).unwrap().id, "u1");
  }

  #[test]
  fn test_banned_user_is_rejected() {
    let db = test_state();
    insert_user(&db, "u1", 0);
    set_banned(&db, "u1");
    assert!(matches!(
      require_user(&db, Some(&live("u1"))),
      Err(AppError::Forbidden(_))
    ));
  }

  #[test]
  fn test_require_admin() {
    let db = test_state();
    insert_user(&db, "u1", 0);
    insert_admin(&db, "a1");

    assert!(matches!(
      require_admin(&db, Some(&live("u1"))),
      Err(AppError::Forbidden(_))
    ));
    assert!(require_admin(&db, Some(&live("a1"))).unwrap().is_admin());
  }

  #[tokio::test]
  async fn test_signed_in_uses_session_state() {
    let db = test_state();
    insert_admin(&db, "a1");
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::file_only(dir.path());
    let config = AppConfig::default();
    let state = SessionState::default();
    let ctx = AuthContext {
      db: &db,
      config: &config,
      store: &store,
      state: &state,
    };
    assert!(matches!(signed_in(&ctx).await, Err(AppError::Unauthorized)));

    *state.0.lock().await = Some(live("a1"));
    assert_eq!(signed_in(&ctx).await.unwrap().id, "a1");
    assert!(signed_in_admin(&ctx).await.is_ok());
  }

  #[tokio::test]
  async fn test_signed_in_refreshes_expiring_session() {
    let db = test_state();
    insert_user(&db, "refresher", 0);
    let fresh_expiry = chrono::Utc::now().timestamp() + 3600;
    let body = serde_json::json!({
      "access_token": "fresh-access",
      "refresh_token": "fresh-refresh",
      "expires_in": 3600,
      "expires_at": fresh_expiry,
      "user": { "id": "refresher", "email": "refresher@example.com" }
    })
    .to_string();
    let config = AppConfig {
      supabase_url: Some(serve_json_once(body)),
      supabase_anon_key: Some("anon".to_string()),
      ..Default::default()
    };
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::file_only(dir.path());
    let state = SessionState::default();
    // Inside the one-minute margin, so the guard must refresh rather than reject.
    *state.0.lock().await = Some(session_for("refresher", chrono::Utc::now().timestamp() + 30));
    let ctx = AuthContext {
      db: &db,
      config: &config,
      store: &store,
      state: &state,
    };

    assert_eq!(signed_in(&ctx).await.unwrap().id, "refresher");

    let session = state.0.lock().await.clone().unwrap();
    assert_eq!(session.access_token, "fresh-access");
    assert_eq!(session.expires_at, fresh_expiry);
    assert_eq!(store.retrieve().unwrap().unwrap().refresh_token, "fresh-refresh");
  }

  #[tokio::test]
  async fn test_signed_in_rejects_when_refresh_fails() {
    let db = test_state();
    insert_user(&db, "stale", 0);
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::file_only(dir.path());
    let config = AppConfig::default();
    let state = SessionState::default();
    *state.0.lock().await = Some(session_for("stale", chrono::Utc::now().timestamp() + 30));
    let ctx = AuthContext {
      db: &db,
      config: &config,
      store: &store,
      state: &state,
    };

    assert!(matches!(signed_in(&ctx).await, Err(AppError::Unauthorized)));
    assert!(state.0.lock().await.is_none());
  }
}
