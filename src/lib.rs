pub mod auth;
pub mod banners;
pub mod bracket;
#[cfg(feature = "desktop")]
mod commands;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod events;
pub mod games;
pub mod notifications;
pub mod preferences;
pub mod settings;
pub mod storage;
pub mod tournaments;
pub mod users;
pub mod validation;
pub mod wallet;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod ts_exports;

#[cfg(feature = "desktop")]
pub use app::run;

#[cfg(feature = "desktop")]
mod app {
    use tauri::Manager;
    use tauri_plugin_log::{Target, TargetKind};

    use crate::auth::{SessionState, SessionStore};
    use crate::config::AppConfig;
    use crate::constants::{DB_FILE, STORAGE_DIR};
    use crate::db::{self, DbState};
    use crate::storage::StorageService;
    use crate::*;

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        let config = AppConfig::from_env();

        tauri::Builder::default()
            .plugin(
                tauri_plugin_log::Builder::new()
                    .level(config.log_level)
                    .targets([
                        Target::new(TargetKind::Stdout),
                        Target::new(TargetKind::LogDir { file_name: None }),
                    ])
                    .build(),
            )
            .plugin(tauri_plugin_store::Builder::new().build())
            .plugin(tauri_plugin_fs::init())
            .plugin(tauri_plugin_opener::init())
            .manage(DbState::empty())
            .manage(SessionState::default())
            .setup(move |app| {
                let app_handle = app.handle().clone();
                events::emitter::register(app_handle.clone());

                let data_dir = app.path().app_data_dir()?;
                let db_path = config.db_path.clone().unwrap_or_else(|| data_dir.join(DB_FILE));
                let conn = db::initialize_database(&db_path)?;
                app.manage(db::commands::DatabasePath(db_path));
                let state = app.state::<DbState>();
                match state.0.lock() {
                    Ok(mut guard) => *guard = Some(conn),
                    Err(_) => return Err("Failed to acquire DB lock".into()),
                }
                log::info!("[setup] Database initialized successfully.");

                let storage_root = config
                    .storage_dir
                    .clone()
                    .unwrap_or_else(|| data_dir.join(STORAGE_DIR));
                app.manage(StorageService::new(storage_root));
                app.manage(SessionStore::new(data_dir));
                app.manage(config.clone());

                tauri::async_runtime::spawn(async move {
                    auth::commands::restore_on_launch(&app_handle).await;
                });
                Ok(())
            })
            .invoke_handler(tauri::generate_handler![
                auth::commands::sign_up,
                auth::commands::sign_in,
                auth::commands::sign_out,
                auth::commands::get_current_user,
                auth::commands::request_password_reset,
                users::commands::get_my_profile,
                users::commands::update_my_profile,
                users::commands::set_my_avatar,
                users::commands::admin_list_users,
                users::commands::admin_set_role,
                users::commands::admin_set_banned,
                users::commands::admin_delete_user,
                users::commands::admin_adjust_balance,
                games::commands::list_games,
                games::commands::get_game,
                games::commands::create_game,
                games::commands::update_game,
                games::commands::delete_game,
                banners::commands::list_banners,
                banners::commands::create_banner,
                banners::commands::update_banner,
                banners::commands::delete_banner,
                banners::commands::reorder_banners,
                tournaments::commands::list_tournaments,
                tournaments::commands::get_tournament,
                tournaments::commands::list_my_tournaments,
                tournaments::commands::join_tournament,
                tournaments::commands::leave_tournament,
                tournaments::commands::create_tournament,
                tournaments::commands::update_tournament,
                tournaments::commands::delete_tournament,
                tournaments::commands::set_room_credentials,
                tournaments::commands::cancel_tournament,
                tournaments::commands::start_tournament,
                bracket::commands::get_bracket,
                bracket::commands::report_match_result,
                bracket::commands::set_bracket_slot,
                bracket::commands::reset_bracket_match,
                wallet::commands::list_my_transactions,
                wallet::commands::admin_list_transactions,
                wallet::commands::admin_record_deposit,
                wallet::commands::request_withdrawal,
                wallet::commands::list_my_withdrawals,
                wallet::commands::admin_list_withdrawals,
                wallet::commands::approve_withdrawal,
                wallet::commands::reject_withdrawal,
                notifications::commands::list_notifications,
                notifications::commands::unread_notification_count,
                notifications::commands::mark_notification_read,
                notifications::commands::mark_all_notifications_read,
                notifications::commands::delete_notification,
                notifications::commands::admin_send_notification,
                settings::commands::get_public_payment_settings,
                settings::commands::get_payment_settings,
                settings::commands::save_payment_settings,
                storage::commands::upload_image,
                storage::commands::delete_image,
                db::commands::admin_reset_database,
                preferences::commands::load_preferences,
                preferences::commands::save_preferences,
                preferences::commands::refresh_preferences_cache,
            ])
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }
}
