use tauri::{AppHandle, Manager};

use crate::banners::{models::*, BannerService};
use crate::commands::current_admin;
use crate::db::DbState;
use crate::error::ServiceResult;
use crate::storage::StorageService;

/// Carousel banners. Inactive ones are only listed for admins.
#[tauri::command]
pub async fn list_banners(app: AppHandle, active_only: bool) -> ServiceResult<Vec<Banner>> {
    let db = app.state::<DbState>();
    if !active_only {
        if let Err(e) = current_admin(&app).await {
            return ServiceResult::err(e);
        }
    }
    BannerService::list(&db, active_only).into()
}

#[tauri::command]
pub async fn create_banner(app: AppHandle, form: BannerForm) -> ServiceResult<Banner> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| BannerService::create(&db, form))
        .into()
}

#[tauri::command]
pub async fn update_banner(app: AppHandle, id: String, form: BannerForm) -> ServiceResult<Banner> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| BannerService::update(&db, &id, form))
        .map(|(banner, replaced)| {
            app.state::<StorageService>().discard(replaced.as_deref());
            banner
        })
        .into()
}

#[tauri::command]
pub async fn delete_banner(app: AppHandle, id: String) -> ServiceResult<()> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| BannerService::delete(&db, &id))
        .map(|banner| app.state::<StorageService>().discard(Some(&banner.image_path)))
        .into()
}

#[tauri::command]
pub async fn reorder_banners(app: AppHandle, ids: Vec<String>) -> ServiceResult<Vec<Banner>> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| BannerService::reorder(&db, &ids))
        .into()
}
