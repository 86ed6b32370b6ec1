use tauri::{AppHandle, Manager};

use crate::commands::{current_admin, current_user};
use crate::db::DbState;
use crate::error::ServiceResult;
use crate::notifications::{models::*, NotificationService};

#[tauri::command]
pub async fn list_notifications(
    app: AppHandle,
    unread_only: bool,
    offset: u32,
    limit: Option<u32>,
) -> ServiceResult<Vec<Notification>> {
    let db = app.state::<DbState>();
    current_user(&app)
        .await
        .and_then(|user| NotificationService::list(&db, &user.id, unread_only, offset, limit))
        .into()
}

#[tauri::command]
pub async fn unread_notification_count(app: AppHandle) -> ServiceResult<i64> {
    let db = app.state::<DbState>();
    current_user(&app)
        .await
        .and_then(|user| NotificationService::unread_count(&db, &user.id))
        .into()
}

#[tauri::command]
pub async fn mark_notification_read(app: AppHandle, id: String) -> ServiceResult<()> {
    let db = app.state::<DbState>();
    current_user(&app)
        .await
        .and_then(|user| NotificationService::mark_read(&db, &user.id, &id))
        .into()
}

#[tauri::command]
pub async fn mark_all_notifications_read(app: AppHandle) -> ServiceResult<usize> {
    let db = app.state::<DbState>();
    current_user(&app)
        .await
        .and_then(|user| NotificationService::mark_all_read(&db, &user.id))
        .into()
}

#[tauri::command]
pub async fn delete_notification(app: AppHandle, id: String) -> ServiceResult<()> {
    let db = app.state::<DbState>();
    current_user(&app)
        .await
        .and_then(|user| NotificationService::delete(&db, &user.id, &id))
        .into()
}

/// Admin announcement to one user, one tournament's teams, or everyone.
#[tauri::command]
pub async fn admin_send_notification(
    app: AppHandle,
    audience: Audience,
    draft: NotificationDraft,
) -> ServiceResult<usize> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| NotificationService::send(&db, audience, draft))
        .into()
}
