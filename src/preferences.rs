//! Per-device UI preferences. Unlike payment settings these never leave the machine.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "preferences.ts")]
pub enum Theme {
    System,
    Light,
    Dark,
}

impl Default for Theme {
    fn default() -> Self {
        Self::System
    }
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "light" => Self::Light,
            "dark" => Self::Dark,
            _ => Self::System, // Default fallback
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export, export_to = "preferences.ts")]
pub struct UserPreferences {
    pub theme: Theme,
    /// Show toasts for incoming notifications.
    pub toast_notifications: bool,
    /// Game preselected in the tournament browser.
    pub default_game_id: Option<String>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            toast_notifications: true,
            default_game_id: None,
        }
    }
}

#[cfg(feature = "desktop")]
mod store {
    use once_cell::sync::Lazy;
    use std::sync::{Arc, Mutex};
    use tauri::AppHandle;
    use tauri_plugin_store::{Store, StoreExt};

    use super::UserPreferences;
    use crate::constants::{PREFERENCES_KEY, PREFERENCES_STORE_PATH};

    // Cache for frequently accessed preferences
    static PREFERENCES_CACHE: Lazy<Mutex<Option<UserPreferences>>> = Lazy::new(|| Mutex::new(None));

    fn get_store(app_handle: &AppHandle) -> Result<Arc<Store<tauri::Wry>>, String> {
        app_handle
            .store(PREFERENCES_STORE_PATH)
            .map_err(|e| format!("Failed to get preferences store: {}", e))
    }

    fn cache_put(preferences: &UserPreferences) {
        if let Ok(mut cache) = PREFERENCES_CACHE.lock() {
            *cache = Some(preferences.clone());
        }
    }

    /// Load preferences from store with caching
    pub fn load(app_handle: &AppHandle) -> Result<UserPreferences, String> {
        if let Ok(cache) = PREFERENCES_CACHE.lock() {
            if let Some(preferences) = cache.as_ref() {
                return Ok(preferences.clone());
            }
        }

        let store = get_store(app_handle)?;
        let preferences = match store.get(PREFERENCES_KEY) {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                log::warn!("[preferences] Stored preferences unreadable: {}", e);
                UserPreferences::default()
            }),
            None => UserPreferences::default(),
        };

        cache_put(&preferences);
        Ok(preferences)
    }

    /// Save preferences to store and update cache
    pub fn save(app_handle: &AppHandle, preferences: &UserPreferences) -> Result<(), String> {
        let store = get_store(app_handle)?;
        let value = serde_json::to_value(preferences)
            .map_err(|e| format!("Failed to serialize preferences: {}", e))?;

        store.set(PREFERENCES_KEY, value);
        store
            .save()
            .map_err(|e| format!("Failed to save preferences: {}", e))?;

        cache_put(preferences);
        Ok(())
    }

    pub fn clear_cache() {
        if let Ok(mut cache) = PREFERENCES_CACHE.lock() {
            *cache = None;
        }
    }
}

#[cfg(feature = "desktop")]
pub mod commands {
    use tauri::AppHandle;

    use super::{store, UserPreferences};
    use crate::error::{AppError, ServiceResult};

    #[tauri::command]
    pub async fn load_preferences(app_handle: AppHandle) -> ServiceResult<UserPreferences> {
        store::load(&app_handle).map_err(AppError::Storage).into()
    }

    #[tauri::command]
    pub async fn save_preferences(app_handle: AppHandle, preferences: UserPreferences) -> ServiceResult<()> {
        store::save(&app_handle, &preferences).map_err(AppError::Storage).into()
    }

    #[tauri::command]
    pub async fn refresh_preferences_cache() -> ServiceResult<()> {
        store::clear_cache();
        ServiceResult::ok(())
    }
}
