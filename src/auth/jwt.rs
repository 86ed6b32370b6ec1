use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct JwtClaims {
  pub sub: String,
  pub email: Option<String>,
  /// Postgres role the token grants, "authenticated" for signed-in users.
  pub role: Option<String>,
  pub exp: i64,
}

/// Decode the claims of a JWT without verifying it (for reading user info only)
pub fn decode_claims(token: &str) -> AppResult<JwtClaims> {
  let parts: Vec<&str> = token.split('.').collect();
  if parts.len() != 3 {
    return Err(AppError::Auth("Invalid JWT token format".to_string()));
  }

  // JWT segments are base64url; tolerate stray padding
  let decoded = URL_SAFE_NO_PAD
    .decode(parts[1].trim_end_matches('='))
    .map_err(|e| AppError::Auth(format!("Failed to decode JWT payload: {}", e)))?;

  serde_json::from_slice::<JwtClaims>(&decoded)
    .map_err(|e| AppError::Auth(format!("Failed to parse JWT claims: {}", e)))
}

pub fn is_token_expired(token: &str) -> AppResult<bool> {
  let claims = decode_claims(token)?;
  Ok(claims.exp < chrono::Utc::now().timestamp())
}
