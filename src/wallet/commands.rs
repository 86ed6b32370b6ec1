use tauri::{AppHandle, Manager};

use crate::commands::{current_admin, current_user};
use crate::db::DbState;
use crate::error::ServiceResult;
use crate::wallet::{models::*, WalletService, WithdrawalService};

#[tauri::command]
pub async fn list_my_transactions(app: AppHandle, offset: u32, limit: Option<u32>) -> ServiceResult<Vec<Transaction>> {
    let db = app.state::<DbState>();
    current_user(&app)
        .await
        .and_then(|user| WalletService::list_transactions(&db, &user.id, offset, limit))
        .into()
}

#[tauri::command]
pub async fn admin_list_transactions(
    app: AppHandle,
    kind: Option<TransactionKind>,
    offset: u32,
    limit: Option<u32>,
) -> ServiceResult<Vec<Transaction>> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| WalletService::list_all_transactions(&db, kind, offset, limit))
        .into()
}

/// Credit a payment an admin has confirmed with the gateway.
#[tauri::command]
pub async fn admin_record_deposit(app: AppHandle, request: DepositRequest) -> ServiceResult<Transaction> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| WalletService::deposit(&db, request))
        .into()
}

#[tauri::command]
pub async fn request_withdrawal(app: AppHandle, form: WithdrawalForm) -> ServiceResult<WithdrawalRequest> {
    let db = app.state::<DbState>();
    current_user(&app)
        .await
        .and_then(|user| WithdrawalService::request(&db, &user.id, form))
        .into()
}

#[tauri::command]
pub async fn list_my_withdrawals(app: AppHandle) -> ServiceResult<Vec<WithdrawalRequest>> {
    let db = app.state::<DbState>();
    current_user(&app)
        .await
        .and_then(|user| WithdrawalService::list_for_user(&db, &user.id))
        .into()
}

#[tauri::command]
pub async fn admin_list_withdrawals(
    app: AppHandle,
    status: Option<WithdrawalStatus>,
    offset: u32,
    limit: Option<u32>,
) -> ServiceResult<Vec<WithdrawalRequest>> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| WithdrawalService::list(&db, status, offset, limit))
        .into()
}

#[tauri::command]
pub async fn approve_withdrawal(app: AppHandle, id: String, note: Option<String>) -> ServiceResult<WithdrawalRequest> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| WithdrawalService::approve(&db, &id, note))
        .into()
}

#[tauri::command]
pub async fn reject_withdrawal(app: AppHandle, id: String, note: Option<String>) -> ServiceResult<WithdrawalRequest> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| WithdrawalService::reject(&db, &id, note))
        .into()
}
