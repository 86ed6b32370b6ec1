//! Shared HTTP client and rate limiting for auth requests.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{AppError, AppResult};

// ============================================================================
// Shared HTTP Client
// ============================================================================

/// Shared HTTP client for all auth requests to avoid per-request overhead
pub static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
  reqwest::Client::builder()
    .timeout(Duration::from_secs(30))
    .connect_timeout(Duration::from_secs(10))
    .pool_max_idle_per_host(5)
    .build()
    .unwrap_or_else(|e| {
      log::warn!("[auth] Falling back to default HTTP client: {}", e);
      reqwest::Client::new()
    })
});

// ============================================================================
// Rate Limiting
// ============================================================================

#[derive(Debug, Clone, Default)]
struct RateLimitState {
  attempts: Vec<Instant>,
  lockout_until: Option<Instant>,
}

const MAX_ATTEMPTS_PER_WINDOW: usize = 5;
const WINDOW_DURATION_SECS: u64 = 60; // 1 minute window
const LOCKOUT_DURATION_SECS: u64 = 300; // 5 minute lockout after exceeding limit

/// Keyed by operation + identifier (e.g., "sign_in:user@email.com")
static RATE_LIMIT_STORE: Lazy<Mutex<HashMap<String, RateLimitState>>> =
  Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Debug, Clone, Copy)]
pub enum RateLimitOp {
  SignIn,
  SignUp,
  PasswordReset,
  RefreshToken,
}

impl RateLimitOp {
  fn as_str(&self) -> &'static str {
    match self {
      RateLimitOp::SignIn => "sign_in",
      RateLimitOp::SignUp => "sign_up",
      RateLimitOp::PasswordReset => "password_reset",
      RateLimitOp::RefreshToken => "refresh_token",
    }
  }
}

fn key(op: RateLimitOp, identifier: &str) -> String {
  format!("{}:{}", op.as_str(), identifier.trim().to_lowercase())
}

fn too_many(seconds: u64) -> AppError {
  AppError::Forbidden(format!(
    "Too many attempts. Please try again in {} seconds.",
    seconds
  ))
}

impl RateLimitState {
  /// No lockout in force and nothing left in the window.
  fn is_stale(&self, now: Instant) -> bool {
    let window = Duration::from_secs(WINDOW_DURATION_SECS);
    self.lockout_until.map_or(true, |until| now >= until)
      && self.attempts.iter().all(|&t| now.duration_since(t) >= window)
  }
}

fn prune(store: &mut HashMap<String, RateLimitState>, now: Instant) {
  store.retain(|_, state| !state.is_stale(now));
}

/// Fail if `identifier` has used up its attempts for `op`.
pub fn check_rate_limit(op: RateLimitOp, identifier: &str) -> AppResult<()> {
  let now = Instant::now();
  let mut store = RATE_LIMIT_STORE
    .lock()
    .map_err(|_| AppError::Internal("Failed to check rate limit".to_string()))?;

  prune(&mut store, now);
  let Some(state) = store.get_mut(&key(op, identifier)) else {
    return Ok(());
  };

  if let Some(lockout_until) = state.lockout_until {
    if now < lockout_until {
      return Err(too_many((lockout_until - now).as_secs()));
    }
    state.lockout_until = None;
    state.attempts.clear();
  }

  let window = Duration::from_secs(WINDOW_DURATION_SECS);
  state.attempts.retain(|&t| now.duration_since(t) < window);

  if state.attempts.len() >= MAX_ATTEMPTS_PER_WINDOW {
    state.lockout_until = Some(now + Duration::from_secs(LOCKOUT_DURATION_SECS));
    log::warn!("[auth] Rate limit hit for {}", op.as_str());
    return Err(too_many(LOCKOUT_DURATION_SECS));
  }

  Ok(())
}

pub fn record_attempt(op: RateLimitOp, identifier: &str) {
  if let Ok(mut store) = RATE_LIMIT_STORE.lock() {
    store.entry(key(op, identifier)).or_default().attempts.push(Instant::now());
  }
}

/// Forget past attempts, e.g. after a successful sign-in.
pub fn clear_rate_limit(op: RateLimitOp, identifier: &str) {
  if let Ok(mut store) = RATE_LIMIT_STORE.lock() {
    store.remove(&key(op, identifier));
  }
}
