use tauri::{AppHandle, Manager};

use crate::commands::current_admin;
use crate::db::DbState;
use crate::error::ServiceResult;
use crate::settings::{self, PaymentGatewaySettings};

/// Gateway settings with the secret masked, for the wallet screens.
#[tauri::command]
pub async fn get_public_payment_settings(app: AppHandle) -> ServiceResult<PaymentGatewaySettings> {
    settings::public_payment_settings(&app.state::<DbState>()).into()
}

#[tauri::command]
pub async fn get_payment_settings(app: AppHandle) -> ServiceResult<PaymentGatewaySettings> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| settings::load_payment_settings(&db))
        .into()
}

#[tauri::command]
pub async fn save_payment_settings(app: AppHandle, settings: PaymentGatewaySettings) -> ServiceResult<()> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| settings::save_payment_settings(&db, &settings))
        .into()
}
