//! The app handle events are emitted through, registered once during setup.

use once_cell::sync::OnceCell;
use serde::Serialize;
use tauri::{AppHandle, Emitter};

static APP_HANDLE: OnceCell<AppHandle> = OnceCell::new();

pub fn register(handle: AppHandle) {
    if APP_HANDLE.set(handle).is_err() {
        log::debug!("[events] App handle already registered");
    }
}

/// Broadcast `payload` to every webview.
pub fn emit<T: Serialize + Clone>(event: &str, payload: T) -> Result<(), String> {
    let handle = APP_HANDLE
        .get()
        .ok_or_else(|| "AppHandle not initialized".to_string())?;
    handle
        .emit(event, payload)
        .map_err(|e| format!("Failed to emit event '{}': {}", event, e))
}
