//! Supabase GoTrue REST client.

use serde::de::DeserializeOwned;
use serde_json::json;

use crate::auth::security::HTTP_CLIENT;
use crate::auth::types::{SupabaseAuthResponse, SupabaseSignUpResponse};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct SupabaseClient {
  base_url: String,
  api_key: String,
}

/// Pull a readable message out of a GoTrue error body.
pub(crate) fn error_message(body: &str) -> String {
  let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
  ["error_description", "msg", "message", "error"]
    .iter()
    .find_map(|key| parsed.get(key).and_then(|v| v.as_str()))
    .map(str::to_string)
    .unwrap_or_else(|| {
      if body.trim().is_empty() {
        "Unknown error".to_string()
      } else {
        body.trim().to_string()
      }
    })
}

impl SupabaseClient {
  pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
    Self {
      base_url: base_url.into().trim_end_matches('/').to_string(),
      api_key: api_key.into(),
    }
  }

  pub fn from_config(config: &AppConfig) -> AppResult<Self> {
    let (url, key) = config.supabase_credentials()?;
    Ok(Self::new(url, key))
  }

  fn endpoint(&self, path: &str) -> String {
    format!("{}/auth/v1/{}", self.base_url, path)
  }

  async fn post<T: DeserializeOwned>(
    &self,
    path: &str,
    bearer: Option<&str>,
    body: serde_json::Value,
    action: &str,
  ) -> AppResult<Option<T>> {
    let mut request = HTTP_CLIENT
      .post(self.endpoint(path))
      .header("apikey", &self.api_key)
      .json(&body);
    if let Some(token) = bearer {
      request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
      log::warn!("[auth] {} failed with {}", action, status);
      return Err(AppError::Auth(format!("{} failed: {}", action, error_message(&text))));
    }
    if text.trim().is_empty() {
      return Ok(None);
    }
    Ok(Some(serde_json::from_str(&text).map_err(|e| {
      AppError::Auth(format!("Failed to parse {} response: {}", action, e))
    })?))
  }

  async fn post_expecting<T: DeserializeOwned>(
    &self,
    path: &str,
    body: serde_json::Value,
    action: &str,
  ) -> AppResult<T> {
    self
      .post(path, None, body, action)
      .await?
      .ok_or_else(|| AppError::Auth(format!("{} returned an empty response", action)))
  }

  pub async fn sign_up(&self, email: &str, password: &str, username: &str) -> AppResult<SupabaseSignUpResponse> {
    let body = json!({
      "email": email,
      "password": password,
      "data": { "username": username }
    });
    self.post_expecting("signup", body, "Sign up").await
  }

  pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<SupabaseAuthResponse> {
    let body = json!({ "email": email, "password": password });
    self.post_expecting("token?grant_type=password", body, "Sign in").await
  }

  pub async fn refresh(&self, refresh_token: &str) -> AppResult<SupabaseAuthResponse> {
    let body = json!({ "refresh_token": refresh_token });
    self
      .post_expecting("token?grant_type=refresh_token", body, "Session refresh")
      .await
  }

  /// Ask the backend to mail a password reset link.
  pub async fn recover(&self, email: &str) -> AppResult<()> {
    self
      .post::<serde_json::Value>("recover", None, json!({ "email": email }), "Password reset")
      .await?;
    Ok(())
  }

  pub async fn sign_out(&self, access_token: &str) -> AppResult<()> {
    self
      .post::<serde_json::Value>("logout", Some(access_token), json!({}), "Sign out")
      .await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_message() {
    assert_eq!(
      error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
      "Invalid login credentials"
    );
    assert_eq!(error_message(r#"{"code":422,"msg":"User already registered"}"#), "User already registered");
    assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    assert_eq!(error_message(""), "Unknown error");
  }

  #[test]
  fn test_endpoint() {
    let client = SupabaseClient::new("https://demo.supabase.co/", "anon");
    assert_eq!(
      client.endpoint("token?grant_type=password"),
      "https://demo.supabase.co/auth/v1/token?grant_type=password"
    );
  }

  #[test]
  fn test_from_config_needs_credentials() {
    assert!(matches!(
      SupabaseClient::from_config(&AppConfig::default()),
      Err(AppError::Config(_))
    ));
  }
}
