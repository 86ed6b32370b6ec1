use tauri::{AppHandle, Manager};

use crate::commands::{current_admin, current_user};
use crate::db::DbState;
use crate::error::{AppError, ServiceResult};
use crate::storage::{Bucket, StorageService};
use crate::users::{models::*, UserService};
use crate::wallet::Transaction;

#[tauri::command]
pub async fn get_my_profile(app: AppHandle) -> ServiceResult<UserProfile> {
    current_user(&app).await.into()
}

#[tauri::command]
pub async fn update_my_profile(app: AppHandle, request: UpdateProfileRequest) -> ServiceResult<UserProfile> {
    let db = app.state::<DbState>();
    current_user(&app)
        .await
        .and_then(|user| UserService::update_profile(&db, &user.id, request))
        .into()
}

/// Point the avatar at an image previously uploaded to the avatars bucket, or clear it.
#[tauri::command]
pub async fn set_my_avatar(app: AppHandle, path: Option<String>) -> ServiceResult<UserProfile> {
    let db = app.state::<DbState>();
    let storage = app.state::<StorageService>();
    current_user(&app)
        .await
        .and_then(|user| {
            if let Some(path) = &path {
                let prefix = format!("{}/", Bucket::Avatars.as_str());
                if !path.starts_with(&prefix) || !storage.resolve(path)?.exists() {
                    return Err(AppError::invalid("avatar", "Upload the avatar image first"));
                }
            }
            let previous = UserService::set_avatar(&db, &user.id, path.as_deref())?;
            if previous != path {
                storage.discard(previous.as_deref());
            }
            UserService::get_profile(&db, &user.id)
        })
        .into()
}

#[tauri::command]
pub async fn admin_list_users(
    app: AppHandle,
    filter: UserFilter,
    offset: u32,
    limit: Option<u32>,
) -> ServiceResult<Vec<UserProfile>> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| UserService::list_users(&db, &filter, offset, limit))
        .into()
}

#[tauri::command]
pub async fn admin_set_role(app: AppHandle, user_id: String, role: Role) -> ServiceResult<UserProfile> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|admin| UserService::set_role(&db, &admin.id, &user_id, role))
        .into()
}

#[tauri::command]
pub async fn admin_set_banned(app: AppHandle, user_id: String, banned: bool) -> ServiceResult<UserProfile> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|admin| UserService::set_banned(&db, &admin.id, &user_id, banned))
        .into()
}

#[tauri::command]
pub async fn admin_delete_user(app: AppHandle, user_id: String) -> ServiceResult<()> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|admin| {
            let avatar = UserService::get_profile(&db, &user_id)?.avatar_path;
            UserService::delete_user(&db, &admin.id, &user_id)?;
            app.state::<StorageService>().discard(avatar.as_deref());
            Ok(())
        })
        .into()
}

#[tauri::command]
pub async fn admin_adjust_balance(
    app: AppHandle,
    user_id: String,
    adjustment: BalanceAdjustment,
) -> ServiceResult<Transaction> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|admin| UserService::adjust_balance(&db, &admin.id, &user_id, adjustment))
        .into()
}
