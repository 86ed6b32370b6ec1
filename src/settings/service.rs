use rusqlite::{params, Connection, OptionalExtension};

use super::types::PaymentGatewaySettings;
use crate::constants::PAYMENT_SETTINGS_KEY;
use crate::db::{now, with_conn, DbState};
use crate::error::AppResult;
use crate::validation::ensure_valid;

/// Read the payment settings through an open connection, falling back to defaults.
pub(crate) fn payment_settings(conn: &Connection) -> AppResult<PaymentGatewaySettings> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM app_settings WHERE key = ?1",
            params![PAYMENT_SETTINGS_KEY],
            |row| row.get(0),
        )
        .optional()?;

    let settings = match stored {
        Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
            log::warn!("[settings] Stored payment settings unreadable, using defaults: {}", e);
            PaymentGatewaySettings::default()
        }),
        None => PaymentGatewaySettings::default(),
    };
    Ok(settings)
}

pub fn load_payment_settings(db: &DbState) -> AppResult<PaymentGatewaySettings> {
    with_conn(db, payment_settings)
}

/// Settings as shown to non-admins.
pub fn public_payment_settings(db: &DbState) -> AppResult<PaymentGatewaySettings> {
    Ok(load_payment_settings(db)?.public_view())
}

pub fn save_payment_settings(db: &DbState, settings: &PaymentGatewaySettings) -> AppResult<()> {
    ensure_valid(settings)?;

    let value = serde_json::to_string(settings)?;
    with_conn(db, |conn| {
        conn.execute(
            "INSERT INTO app_settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![PAYMENT_SETTINGS_KEY, value, now()],
        )?;
        Ok(())
    })?;

    log::info!("[settings] Payment gateway set to {}", settings.provider.as_str());
    Ok(())
}
