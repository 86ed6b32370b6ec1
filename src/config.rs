//! Process configuration read from the environment (and `.env`, when present).

use std::path::PathBuf;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub db_path: Option<PathBuf>,
    pub storage_dir: Option<PathBuf>,
    pub log_level: log::LevelFilter,
    /// Accounts promoted to admin the first time they sign in.
    pub admin_emails: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_anon_key: None,
            db_path: None,
            storage_dir: None,
            log_level: log::LevelFilter::Info,
            admin_emails: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load `.env` if it exists, then read the environment.
    pub fn from_env() -> Self {
        if let Err(e) = dotenv::dotenv() {
            log::debug!("[config] No .env file loaded: {}", e);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let log_level = match non_empty("TOURNAMENT_HUB_LOG_LEVEL") {
            Some(level) => level.parse().unwrap_or_else(|_| {
                log::warn!("[config] Unknown log level '{}', using info", level);
                log::LevelFilter::Info
            }),
            None => log::LevelFilter::Info,
        };

        let admin_emails = non_empty("TOURNAMENT_HUB_ADMIN_EMAILS")
            .map(|list| {
                list.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            supabase_url: non_empty("SUPABASE_URL").map(|u| u.trim_end_matches('/').to_string()),
            supabase_anon_key: non_empty("SUPABASE_ANON_KEY"),
            db_path: non_empty("TOURNAMENT_HUB_DB_PATH").map(PathBuf::from),
            storage_dir: non_empty("TOURNAMENT_HUB_STORAGE_DIR").map(PathBuf::from),
            log_level,
            admin_emails,
        }
    }

    /// The auth backend URL and key, both of which are required to sign in.
    pub fn supabase_credentials(&self) -> AppResult<(String, String)> {
        let url = self
            .supabase_url
            .clone()
            .ok_or_else(|| AppError::Config("Missing SUPABASE_URL".to_string()))?;
        let key = self
            .supabase_anon_key
            .clone()
            .ok_or_else(|| AppError::Config("Missing SUPABASE_ANON_KEY".to_string()))?;
        Ok((url, key))
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.log_level, log::LevelFilter::Info);
        assert!(config.admin_emails.is_empty());
        assert!(matches!(config.supabase_credentials(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_reads_values() {
        let config = config_from(&[
            ("SUPABASE_URL", "https://demo.supabase.co/"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("TOURNAMENT_HUB_LOG_LEVEL", "debug"),
            ("TOURNAMENT_HUB_ADMIN_EMAILS", "Admin@Example.com, ops@example.com,"),
        ]);

        let (url, key) = config.supabase_credentials().unwrap();
        assert_eq!(url, "https://demo.supabase.co");
        assert_eq!(key, "anon");
        assert_eq!(config.log_level, log::LevelFilter::Debug);
        assert_eq!(config.admin_emails, vec!["admin@example.com", "ops@example.com"]);
        assert!(config.is_admin_email("ADMIN@example.com"));
        assert!(!config.is_admin_email("player@example.com"));
    }

    #[test]
    fn test_bad_log_level_falls_back() {
        let config = config_from(&[("TOURNAMENT_HUB_LOG_LEVEL", "loud")]);
        assert_eq!(config.log_level, log::LevelFilter::Info);
    }
}
