//! Sign-up, sign-in and session lifecycle against the Supabase backend.

use crate::auth::security::{check_rate_limit, clear_rate_limit, record_attempt, RateLimitOp};
use crate::auth::storage::SessionStore;
use crate::auth::supabase::SupabaseClient;
use crate::auth::types::*;
use crate::config::AppConfig;
use crate::db::DbState;
use crate::error::{AppError, AppResult};
use crate::events::{self, AuthChangedEvent, AUTH_CHANGED};
use crate::users::{NewProfile, UserProfile, UserService};
use crate::validation::ensure_valid;

/// Everything the auth flows touch, borrowed from managed app state.
pub struct AuthContext<'a> {
  pub db: &'a DbState,
  pub config: &'a AppConfig,
  pub store: &'a SessionStore,
  pub state: &'a SessionState,
}

pub struct AuthService;

fn username_hint(user: &SupabaseUser, fallback: &str) -> String {
  user
    .user_metadata
    .get("username")
    .and_then(|v| v.as_str())
    .map(str::to_string)
    .unwrap_or_else(|| fallback.to_string())
}

fn local_part(email: &str) -> &str {
  email.split('@').next().unwrap_or(email)
}

impl AuthService {
  fn ensure_profile(ctx: &AuthContext<'_>, user: &SupabaseUser, fallback_email: &str, hint: &str) -> AppResult<UserProfile> {
    let email = user.email.clone().unwrap_or_else(|| fallback_email.to_string());
    UserService::ensure_profile(
      ctx.db,
      NewProfile {
        id: user.id.clone(),
        is_admin: ctx.config.is_admin_email(&email),
        email,
        username_hint: username_hint(user, hint),
      },
    )
  }

  async fn activate(ctx: &AuthContext<'_>, session: Session) -> AppResult<()> {
    ctx.store.store(&session)?;
    let user_id = session.user_id.clone();
    *ctx.state.0.lock().await = Some(session);
    events::publish(AUTH_CHANGED, AuthChangedEvent { user_id: Some(user_id) });
    Ok(())
  }

  pub async fn sign_up(ctx: &AuthContext<'_>, request: SignUpRequest) -> AppResult<SignUpOutcome> {
    ensure_valid(&request)?;
    let email = request.email.trim().to_lowercase();
    check_rate_limit(RateLimitOp::SignUp, &email)?;
    record_attempt(RateLimitOp::SignUp, &email);

    let client = SupabaseClient::from_config(ctx.config)?;
    let response = client
      .sign_up(&email, &request.password, request.username.trim())
      .await?;

    let (user, session) = match response {
      SupabaseSignUpResponse::Session(auth) => (auth.user.clone(), Some(auth.into_session())),
      SupabaseSignUpResponse::User(user) => (user, None),
    };
    let profile = Self::ensure_profile(ctx, &user, &email, request.username.trim())?;
    clear_rate_limit(RateLimitOp::SignUp, &email);

    let confirmation_required = session.is_none();
    if let Some(session) = session {
      Self::activate(ctx, session).await?;
    }
    log::info!(
      "[auth] Signed up {} (confirmation required: {})",
      profile.id,
      confirmation_required
    );
    Ok(SignUpOutcome {
      profile,
      confirmation_required,
    })
  }

  pub async fn sign_in(ctx: &AuthContext<'_>, request: SignInRequest) -> AppResult<UserProfile> {
    ensure_valid(&request)?;
    let email = request.email.trim().to_lowercase();
    check_rate_limit(RateLimitOp::SignIn, &email)?;
    record_attempt(RateLimitOp::SignIn, &email);

    let client = SupabaseClient::from_config(ctx.config)?;
    let auth = client.sign_in(&email, &request.password).await?;
    let profile = Self::ensure_profile(ctx, &auth.user, &email, local_part(&email))?;
    if profile.banned {
      log::warn!("[auth] Banned account {} tried to sign in", profile.id);
      if let Err(e) = client.sign_out(&auth.access_token).await {
        log::debug!("[auth] Remote sign-out after ban check failed: {}", e);
      }
      return Err(AppError::Forbidden("This account has been banned".to_string()));
    }

    clear_rate_limit(RateLimitOp::SignIn, &email);
    Self::activate(ctx, auth.into_session()).await?;
    log::info!("[auth] Signed in {}", profile.id);
    Ok(profile)
  }

  /// Forget the local session. The backend logout is best effort.
  pub async fn sign_out(ctx: &AuthContext<'_>) -> AppResult<()> {
    let session = ctx.state.0.lock().await.take();
    if let Some(session) = &session {
      match SupabaseClient::from_config(ctx.config) {
        Ok(client) => {
          if let Err(e) = client.sign_out(&session.access_token).await {
            log::warn!("[auth] Remote sign-out failed: {}", e);
          }
        }
        Err(e) => log::debug!("[auth] Skipping remote sign-out: {}", e),
      }
    }
    ctx.store.clear()?;
    events::publish(AUTH_CHANGED, AuthChangedEvent { user_id: None });
    log::info!("[auth] Signed out");
    Ok(())
  }

  /// Load the stored session at startup, refreshing it when the access token lapsed.
  /// Any failure leaves the app signed out rather than erroring.
  pub async fn restore_session(ctx: &AuthContext<'_>) -> AppResult<Option<UserProfile>> {
    let Some(mut session) = ctx.store.retrieve()? else {
      return Ok(None);
    };

    if session.is_expired() {
      match Self::refresh(ctx.config, &session).await {
        Ok(fresh) => {
          session = fresh;
          ctx.store.store(&session)?;
        }
        Err(e) => {
          log::info!("[auth] Stored session could not be refreshed: {}", e);
          ctx.store.clear()?;
          return Ok(None);
        }
      }
    }

    let profile = match UserService::get_profile(ctx.db, &session.user_id) {
      Ok(profile) if !profile.banned => profile,
      Ok(_) | Err(AppError::NotFound(_)) => {
        ctx.store.clear()?;
        return Ok(None);
      }
      Err(e) => return Err(e),
    };

    *ctx.state.0.lock().await = Some(session);
    log::info!("[auth] Restored session for {}", profile.id);
    Ok(Some(profile))
  }

  async fn refresh(config: &AppConfig, session: &Session) -> AppResult<Session> {
    check_rate_limit(RateLimitOp::RefreshToken, &session.user_id)?;
    record_attempt(RateLimitOp::RefreshToken, &session.user_id);
    let client = SupabaseClient::from_config(config)?;
    let fresh = client.refresh(&session.refresh_token).await?.into_session();
    clear_rate_limit(RateLimitOp::RefreshToken, &session.user_id);
    Ok(fresh)
  }

  pub async fn request_password_reset(config: &AppConfig, email: &str) -> AppResult<()> {
    let email = email.trim().to_lowercase();
    valid_email(&email).map_err(|e| AppError::Validation(vec![e]))?;
    check_rate_limit(RateLimitOp::PasswordReset, &email)?;
    record_attempt(RateLimitOp::PasswordReset, &email);

    SupabaseClient::from_config(config)?.recover(&email).await?;
    log::info!("[auth] Password reset requested");
    Ok(())
  }

  /// The current session with a usable access token. One that is about to lapse is
  /// refreshed in place; if that fails the app is signed out and `None` comes back.
  pub async fn live_session(ctx: &AuthContext<'_>) -> AppResult<Option<Session>> {
    let mut guard = ctx.state.0.lock().await;
    let Some(session) = guard.as_ref() else {
      return Ok(None);
    };
    if !session.is_expired() {
      return Ok(guard.clone());
    }

    match Self::refresh(ctx.config, session).await {
      Ok(fresh) => {
        ctx.store.store(&fresh)?;
        *guard = Some(fresh.clone());
        log::debug!("[auth] Refreshed session for {}", fresh.user_id);
        Ok(Some(fresh))
      }
      Err(e) => {
        log::info!("[auth] Session expired: {}", e);
        *guard = None;
        ctx.store.clear()?;
        events::publish(AUTH_CHANGED, AuthChangedEvent { user_id: None });
        Ok(None)
      }
    }
  }

  /// The signed-in profile, if any. An expired session is refreshed first.
  pub async fn current_user(ctx: &AuthContext<'_>) -> AppResult<Option<UserProfile>> {
    match Self::live_session(ctx).await? {
      Some(session) => Ok(Some(UserService::get_profile(ctx.db, &session.user_id)?)),
      None => Ok(None),
    }
  }
}
