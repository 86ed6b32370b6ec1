use tauri::{AppHandle, Manager};

use crate::commands::current_admin;
use crate::db::DbState;
use crate::error::ServiceResult;
use crate::games::{models::*, GameService};
use crate::storage::StorageService;

#[tauri::command]
pub async fn list_games(app: AppHandle, active_only: bool) -> ServiceResult<Vec<Game>> {
    GameService::list(&app.state::<DbState>(), active_only).into()
}

#[tauri::command]
pub async fn get_game(app: AppHandle, id: String) -> ServiceResult<Game> {
    GameService::get(&app.state::<DbState>(), &id).into()
}

#[tauri::command]
pub async fn create_game(app: AppHandle, form: GameForm) -> ServiceResult<Game> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| GameService::create(&db, form))
        .into()
}

#[tauri::command]
pub async fn update_game(app: AppHandle, id: String, form: GameForm) -> ServiceResult<Game> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| GameService::update(&db, &id, form))
        .map(|(game, replaced)| {
            app.state::<StorageService>().discard(replaced.as_deref());
            game
        })
        .into()
}

#[tauri::command]
pub async fn delete_game(app: AppHandle, id: String) -> ServiceResult<()> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| GameService::delete(&db, &id))
        .map(|game| app.state::<StorageService>().discard(game.image_path.as_deref()))
        .into()
}
