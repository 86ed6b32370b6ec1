use tauri::{AppHandle, Manager};

use crate::bracket::Bracket;
use crate::commands::{current_admin, current_user};
use crate::db::DbState;
use crate::error::ServiceResult;
use crate::storage::StorageService;
use crate::tournaments::{models::*, TournamentService};

#[tauri::command]
pub async fn list_tournaments(
    app: AppHandle,
    filter: TournamentFilter,
    offset: u32,
    limit: Option<u32>,
) -> ServiceResult<Vec<TournamentSummary>> {
    TournamentService::list(&app.state::<DbState>(), &filter, offset, limit).into()
}

/// Browsing works signed out; the viewer only matters for room details and "joined".
#[tauri::command]
pub async fn get_tournament(app: AppHandle, id: String) -> ServiceResult<TournamentDetail> {
    let viewer = current_user(&app).await.ok();
    TournamentService::get_detail(&app.state::<DbState>(), &id, viewer.as_ref()).into()
}

#[tauri::command]
pub async fn list_my_tournaments(app: AppHandle) -> ServiceResult<Vec<Tournament>> {
    let db = app.state::<DbState>();
    current_user(&app)
        .await
        .and_then(|user| TournamentService::list_joined(&db, &user.id))
        .into()
}

#[tauri::command]
pub async fn join_tournament(app: AppHandle, id: String, request: JoinRequest) -> ServiceResult<Team> {
    let db = app.state::<DbState>();
    current_user(&app)
        .await
        .and_then(|user| TournamentService::join(&db, &user, &id, request))
        .into()
}

#[tauri::command]
pub async fn leave_tournament(app: AppHandle, id: String) -> ServiceResult<()> {
    let db = app.state::<DbState>();
    current_user(&app)
        .await
        .and_then(|user| TournamentService::leave(&db, &user.id, &id))
        .into()
}

#[tauri::command]
pub async fn create_tournament(app: AppHandle, form: TournamentForm) -> ServiceResult<Tournament> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|admin| TournamentService::create(&db, &admin.id, form))
        .into()
}

#[tauri::command]
pub async fn update_tournament(app: AppHandle, id: String, form: TournamentForm) -> ServiceResult<Tournament> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| TournamentService::update(&db, &id, form))
        .map(|(tournament, replaced)| {
            app.state::<StorageService>().discard(replaced.as_deref());
            tournament
        })
        .into()
}

#[tauri::command]
pub async fn delete_tournament(app: AppHandle, id: String) -> ServiceResult<()> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| TournamentService::delete(&db, &id))
        .map(|tournament| app.state::<StorageService>().discard(tournament.image_path.as_deref()))
        .into()
}

#[tauri::command]
pub async fn set_room_credentials(
    app: AppHandle,
    id: String,
    credentials: RoomCredentials,
) -> ServiceResult<Tournament> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| TournamentService::set_room_credentials(&db, &id, credentials))
        .into()
}

#[tauri::command]
pub async fn cancel_tournament(app: AppHandle, id: String, reason: Option<String>) -> ServiceResult<Tournament> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| TournamentService::cancel(&db, &id, reason))
        .into()
}

#[tauri::command]
pub async fn start_tournament(app: AppHandle, id: String, seeding: Option<Seeding>) -> ServiceResult<Bracket> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| TournamentService::start(&db, &id, seeding.unwrap_or_default()))
        .into()
}
