use std::path::Path;

use tauri::{AppHandle, Manager};

use crate::commands::{current_admin, current_user};
use crate::error::{AppError, ServiceResult};
use crate::events::{self, UploadProgressEvent, UPLOAD_PROGRESS};
use crate::storage::{Bucket, StorageService, StoredFile};

/// Copy a picked file into storage, emitting `upload_progress` for `upload_id` as chunks land.
/// Players may only upload avatars.
#[tauri::command]
pub async fn upload_image(
    app: AppHandle,
    upload_id: String,
    bucket: Bucket,
    source_path: String,
) -> ServiceResult<StoredFile> {
    let user = match current_user(&app).await {
        Ok(user) => user,
        Err(e) => return ServiceResult::err(e),
    };
    if bucket != Bucket::Avatars && !user.is_admin() {
        return ServiceResult::err(AppError::Forbidden(format!(
            "Only admins can upload {} images",
            bucket.as_str()
        )));
    }

    let storage = app.state::<StorageService>().inner().clone();
    let upload = tauri::async_runtime::spawn_blocking(move || {
        storage.upload_from_path(bucket, Path::new(&source_path), |progress| {
            events::publish(
                UPLOAD_PROGRESS,
                UploadProgressEvent {
                    upload_id: upload_id.clone(),
                    bytes_transferred: progress.bytes_transferred as i64,
                    total_bytes: progress.total_bytes as i64,
                    percent: progress.percent,
                },
            );
        })
    })
    .await;

    match upload {
        Ok(result) => result.into(),
        Err(e) => ServiceResult::err(AppError::Internal(format!("Upload task failed: {}", e))),
    }
}

/// Remove an uploaded image that never got attached to a record.
#[tauri::command]
pub async fn delete_image(app: AppHandle, path: String) -> ServiceResult<()> {
    current_admin(&app)
        .await
        .and_then(|_| app.state::<StorageService>().delete(&path))
        .into()
}
