use tauri::{AppHandle, Manager};

use crate::bracket::{Bracket, BracketService, MatchResult};
use crate::commands::current_admin;
use crate::db::DbState;
use crate::error::ServiceResult;

#[tauri::command]
pub async fn get_bracket(app: AppHandle, tournament_id: String) -> ServiceResult<Option<Bracket>> {
    BracketService::get(&app.state::<DbState>(), &tournament_id).into()
}

#[tauri::command]
pub async fn report_match_result(app: AppHandle, tournament_id: String, result: MatchResult) -> ServiceResult<Bracket> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| BracketService::report_result(&db, &tournament_id, result))
        .into()
}

#[tauri::command]
pub async fn set_bracket_slot(
    app: AppHandle,
    tournament_id: String,
    round: usize,
    match_index: usize,
    slot: usize,
    team_id: Option<String>,
) -> ServiceResult<Bracket> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| BracketService::set_slot(&db, &tournament_id, round, match_index, slot, team_id))
        .into()
}

#[tauri::command]
pub async fn reset_bracket_match(
    app: AppHandle,
    tournament_id: String,
    round: usize,
    match_index: usize,
) -> ServiceResult<Bracket> {
    let db = app.state::<DbState>();
    current_admin(&app)
        .await
        .and_then(|_| BracketService::reset_match(&db, &tournament_id, round, match_index))
        .into()
}
