//! Session persistence. The session file in the app data directory holds everything
//! except the refresh token, which goes to the OS keyring when one is available.

use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::auth::types::Session;
use crate::constants::{KEYRING_SERVICE, SESSION_FILE};
use crate::error::{AppError, AppResult};

const KEYRING_USER: &str = "refresh_token";

#[derive(Serialize, Deserialize)]
struct StoredSession {
  access_token: String,
  /// Only set when the keyring could not take it.
  refresh_token: Option<String>,
  expires_at: i64,
  user_id: String,
  email: String,
}

pub struct SessionStore {
  dir: PathBuf,
  use_keyring: bool,
}

fn keyring_entry() -> AppResult<Entry> {
  Entry::new(KEYRING_SERVICE, KEYRING_USER).map_err(|e| AppError::Auth(format!("Keyring unavailable: {}", e)))
}

impl SessionStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self {
      dir: dir.into(),
      use_keyring: true,
    }
  }

  /// A store that never touches the OS keyring (headless machines, tests).
  pub fn file_only(dir: impl Into<PathBuf>) -> Self {
    Self {
      dir: dir.into(),
      use_keyring: false,
    }
  }

  fn path(&self) -> PathBuf {
    self.dir.join(SESSION_FILE)
  }

  fn keyring_set(&self, token: &str) -> bool {
    if !self.use_keyring {
      return false;
    }
    match keyring_entry().and_then(|entry| {
      entry
        .set_password(token)
        .map_err(|e| AppError::Auth(e.to_string()))
    }) {
      Ok(()) => true,
      Err(e) => {
        log::warn!("[auth] Storing refresh token in the session file: {}", e);
        false
      }
    }
  }

  fn keyring_get(&self) -> AppResult<Option<String>> {
    if !self.use_keyring {
      return Ok(None);
    }
    match keyring_entry()?.get_password() {
      Ok(token) => Ok(Some(token)),
      Err(keyring::Error::NoEntry) => Ok(None),
      Err(e) => Err(AppError::Auth(format!("Failed to read keyring: {}", e))),
    }
  }

  pub fn store(&self, session: &Session) -> AppResult<()> {
    fs::create_dir_all(&self.dir)?;
    let in_keyring = self.keyring_set(&session.refresh_token);
    let stored = StoredSession {
      access_token: session.access_token.clone(),
      refresh_token: if in_keyring {
        None
      } else {
        Some(session.refresh_token.clone())
      },
      expires_at: session.expires_at,
      user_id: session.user_id.clone(),
      email: session.email.clone(),
    };
    fs::write(self.path(), serde_json::to_string(&stored)?)?;
    log::debug!("[auth] Session stored for {}", session.user_id);
    Ok(())
  }

  /// The stored session, or `None` when there is none or it is incomplete.
  pub fn retrieve(&self) -> AppResult<Option<Session>> {
    let path = self.path();
    if !path.exists() {
      return Ok(None);
    }
    let stored: StoredSession = match serde_json::from_str(&fs::read_to_string(&path)?) {
      Ok(stored) => stored,
      Err(e) => {
        log::warn!("[auth] Discarding unreadable session file: {}", e);
        self.clear()?;
        return Ok(None);
      }
    };

    let refresh_token = match stored.refresh_token {
      Some(token) => token,
      None => match self.keyring_get()? {
        Some(token) => token,
        None => return Ok(None),
      },
    };

    Ok(Some(Session {
      access_token: stored.access_token,
      refresh_token,
      expires_at: stored.expires_at,
      user_id: stored.user_id,
      email: stored.email,
    }))
  }

  pub fn clear(&self) -> AppResult<()> {
    if self.use_keyring {
      if let Ok(entry) = keyring_entry() {
        match entry.delete_credential() {
          Ok(()) | Err(keyring::Error::NoEntry) => {}
          Err(e) => log::warn!("[auth] Failed to clear keyring entry: {}", e),
        }
      }
    }
    match fs::remove_file(self.path()) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}
