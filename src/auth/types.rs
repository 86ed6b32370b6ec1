use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use ts_rs::TS;

use crate::auth::jwt::decode_claims;
use crate::users::UserProfile;
use crate::validation::{is_email, FieldError, Rules, Validate};

/// Tokens for the signed-in account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
  pub access_token: String,
  pub refresh_token: String,
  /// Unix seconds.
  pub expires_at: i64,
  pub user_id: String,
  pub email: String,
}

impl Session {
  /// Treat the token as expired a minute early so requests don't race the deadline.
  pub fn is_expired(&self) -> bool {
    self.expires_at - 60 <= chrono::Utc::now().timestamp()
  }
}

/// The current session, shared by every command.
#[derive(Default)]
pub struct SessionState(pub Mutex<Option<Session>>);

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "auth.ts")]
pub struct SignUpRequest {
  pub email: String,
  pub password: String,
  pub username: String,
}

impl Validate for SignUpRequest {
  fn validate(&self) -> Vec<FieldError> {
    Rules::new()
      .email("email", &self.email)
      .length_between("password", &self.password, 8, 72)
      .length_between("username", &self.username, 3, 24)
      .finish()
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "auth.ts")]
pub struct SignInRequest {
  pub email: String,
  pub password: String,
}

impl Validate for SignInRequest {
  fn validate(&self) -> Vec<FieldError> {
    Rules::new()
      .email("email", &self.email)
      .required("password", &self.password)
      .finish()
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "auth.ts")]
pub struct SignUpOutcome {
  pub profile: UserProfile,
  /// The backend wants the address confirmed before the first sign-in.
  pub confirmation_required: bool,
}

pub fn valid_email(email: &str) -> Result<(), FieldError> {
  if is_email(email) {
    Ok(())
  } else {
    Err(FieldError::new("email", "Enter a valid email address"))
  }
}

// ---- GoTrue wire types ----

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseUser {
  pub id: String,
  pub email: Option<String>,
  #[serde(default)]
  pub user_metadata: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseAuthResponse {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_in: i64,
  pub expires_at: Option<i64>,
  pub user: SupabaseUser,
}

impl SupabaseAuthResponse {
  pub fn into_session(self) -> Session {
    let expires_at = self
      .expires_at
      .or_else(|| decode_claims(&self.access_token).ok().map(|claims| claims.exp))
      .unwrap_or_else(|| chrono::Utc::now().timestamp() + self.expires_in);
    Session {
      access_token: self.access_token,
      refresh_token: self.refresh_token,
      expires_at,
      user_id: self.user.id,
      email: self.user.email.unwrap_or_default(),
    }
  }
}

/// Sign-up answers with a session when e-mail confirmation is off, and with the bare user otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SupabaseSignUpResponse {
  Session(SupabaseAuthResponse),
  User(SupabaseUser),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sign_up_response_shapes() {
    let with_session: SupabaseSignUpResponse = serde_json::from_str(
      r#"{"access_token":"a","refresh_token":"r","expires_in":3600,"token_type":"bearer",
          "user":{"id":"u1","email":"p@example.com","user_metadata":{"username":"ace"}}}"#,
    )
    .unwrap();
    assert!(matches!(with_session, SupabaseSignUpResponse::Session(_)));

    let bare: SupabaseSignUpResponse =
      serde_json::from_str(r#"{"id":"u1","email":"p@example.com","confirmation_sent_at":"2030-01-01T00:00:00Z"}"#)
        .unwrap();
    assert!(matches!(bare, SupabaseSignUpResponse::User(_)));
  }

  #[test]
  fn test_into_session_prefers_absolute_expiry() {
    let response: SupabaseAuthResponse = serde_json::from_str(
      r#"{"access_token":"a","refresh_token":"r","expires_in":3600,"expires_at":1900000000,
          "user":{"id":"u1","email":"p@example.com"}}"#,
    )
    .unwrap();
    let session = response.into_session();
    assert_eq!(session.expires_at, 1900000000);
    assert_eq!(session.user_id, "u1");
    assert!(!session.is_expired());
  }

  #[test]
  fn test_sign_up_validation() {
    let request = SignUpRequest {
      email: "not-an-email".to_string(),
      password: "short".to_string(),
      username: "ace".to_string(),
    };
    let fields: Vec<String> = request.validate().into_iter().map(|e| e.field).collect();
    assert_eq!(fields, vec!["email", "password"]);
  }
}
