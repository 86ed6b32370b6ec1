use once_cell::sync::Lazy;
use rusqlite::{Connection, Transaction};
use rusqlite_migration::{Migrations, M};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{AppError, AppResult};

pub struct DbState(pub Mutex<Option<Connection>>);

impl DbState {
  pub fn new(conn: Connection) -> Self {
    DbState(Mutex::new(Some(conn)))
  }

  pub fn empty() -> Self {
    DbState(Mutex::new(None))
  }
}

// Database schema migrations
static MIGRATIONS: Lazy<Migrations<'static>> = Lazy::new(|| {
  Migrations::new(vec![M::up(
    r#"
        -- Player profiles, keyed by the auth backend's user id
        CREATE TABLE IF NOT EXISTS users (
          id TEXT PRIMARY KEY,
          email TEXT NOT NULL UNIQUE,
          username TEXT NOT NULL UNIQUE,
          display_name TEXT,
          avatar_path TEXT,
          in_game_name TEXT,
          in_game_id TEXT,
          role TEXT NOT NULL DEFAULT 'user' CHECK(role IN ('user', 'admin')),
          balance INTEGER NOT NULL DEFAULT 0 CHECK(balance >= 0),
          banned INTEGER NOT NULL DEFAULT 0,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);

        CREATE TABLE IF NOT EXISTS games (
          id TEXT PRIMARY KEY,
          name TEXT NOT NULL,
          slug TEXT NOT NULL UNIQUE,
          image_path TEXT,
          active INTEGER NOT NULL DEFAULT 1,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS banners (
          id TEXT PRIMARY KEY,
          title TEXT NOT NULL,
          image_path TEXT NOT NULL,
          link_url TEXT,
          active INTEGER NOT NULL DEFAULT 1,
          position INTEGER NOT NULL DEFAULT 0,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_banners_position ON banners(position);

        CREATE TABLE IF NOT EXISTS tournaments (
          id TEXT PRIMARY KEY,
          title TEXT NOT NULL,
          game_id TEXT NOT NULL,
          description TEXT NOT NULL DEFAULT '',
          rules TEXT NOT NULL DEFAULT '',
          image_path TEXT,
          entry_fee INTEGER NOT NULL DEFAULT 0,
          prize_pool INTEGER NOT NULL DEFAULT 0,
          max_teams INTEGER NOT NULL,
          team_size INTEGER NOT NULL DEFAULT 1,
          status TEXT NOT NULL DEFAULT 'upcoming' CHECK(status IN ('upcoming', 'ongoing', 'completed', 'cancelled')),
          start_time TEXT NOT NULL,
          room_code TEXT,
          room_password TEXT,
          bracket_json TEXT,
          champion_team_id TEXT,
          created_by TEXT NOT NULL,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          FOREIGN KEY (game_id) REFERENCES games (id)
        );
        CREATE INDEX IF NOT EXISTS idx_tournaments_status ON tournaments(status);
        CREATE INDEX IF NOT EXISTS idx_tournaments_game_id ON tournaments(game_id);
        CREATE INDEX IF NOT EXISTS idx_tournaments_start_time ON tournaments(start_time);

        -- A team is one captain's registration in a tournament
        CREATE TABLE IF NOT EXISTS teams (
          id TEXT PRIMARY KEY,
          tournament_id TEXT NOT NULL,
          name TEXT NOT NULL,
          captain_id TEXT,
          players_json TEXT NOT NULL,
          created_at TEXT NOT NULL,
          FOREIGN KEY (tournament_id) REFERENCES tournaments (id) ON DELETE CASCADE,
          FOREIGN KEY (captain_id) REFERENCES users (id) ON DELETE SET NULL,
          UNIQUE(tournament_id, captain_id),
          UNIQUE(tournament_id, name)
        );
        CREATE INDEX IF NOT EXISTS idx_teams_tournament_id ON teams(tournament_id);
        CREATE INDEX IF NOT EXISTS idx_teams_captain_id ON teams(captain_id);

        CREATE TABLE IF NOT EXISTS transactions (
          id TEXT PRIMARY KEY,
          user_id TEXT NOT NULL,
          kind TEXT NOT NULL CHECK(kind IN ('deposit', 'entry_fee', 'prize', 'withdrawal', 'refund', 'adjustment')),
          amount INTEGER NOT NULL,
          balance_after INTEGER NOT NULL,
          reference TEXT,
          description TEXT NOT NULL DEFAULT '',
          created_at TEXT NOT NULL,
          FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_transactions_user_id ON transactions(user_id);
        CREATE INDEX IF NOT EXISTS idx_transactions_created_at ON transactions(created_at DESC);

        CREATE TABLE IF NOT EXISTS withdrawal_requests (
          id TEXT PRIMARY KEY,
          user_id TEXT NOT NULL,
          amount INTEGER NOT NULL CHECK(amount > 0),
          method TEXT NOT NULL,
          account_details TEXT NOT NULL,
          status TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending', 'approved', 'rejected')),
          admin_note TEXT,
          created_at TEXT NOT NULL,
          processed_at TEXT,
          FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_withdrawals_status ON withdrawal_requests(status);
        CREATE INDEX IF NOT EXISTS idx_withdrawals_user_id ON withdrawal_requests(user_id);

        CREATE TABLE IF NOT EXISTS notifications (
          id TEXT PRIMARY KEY,
          user_id TEXT NOT NULL,
          title TEXT NOT NULL,
          body TEXT NOT NULL,
          link TEXT,
          read INTEGER NOT NULL DEFAULT 0,
          created_at TEXT NOT NULL,
          FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_notifications_user_id ON notifications(user_id, read);

        CREATE TABLE IF NOT EXISTS app_settings (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );
      "#,
  )])
});

/// Opens (creating if needed) the database at `path` and runs migrations.
pub fn initialize_database(path: &Path) -> AppResult<Connection> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)
      .map_err(|e| AppError::Database(format!("Failed to create database directory: {}", e)))?;
  }
  log::info!("[db] Database path: {:?}", path);

  let conn = Connection::open(path)
    .map_err(|e| AppError::Database(format!("Failed to open database connection: {}", e)))?;
  prepare(conn)
}

/// A fresh in-memory database with the full schema.
pub fn open_in_memory() -> AppResult<Connection> {
  prepare(Connection::open_in_memory()?)
}

fn prepare(mut conn: Connection) -> AppResult<Connection> {
  conn.pragma_update(None, "foreign_keys", "ON")?;

  log::info!("[db] Applying database migrations...");
  MIGRATIONS.to_latest(&mut conn)?;
  log::info!("[db] Migrations applied successfully.");

  Ok(conn)
}

/// Runs `f` with the shared connection.
pub fn with_conn<T>(state: &DbState, f: impl FnOnce(&Connection) -> AppResult<T>) -> AppResult<T> {
  let guard = state
    .0
    .lock()
    .map_err(|_| AppError::Database("Failed to acquire DB lock".to_string()))?;
  let conn = guard
    .as_ref()
    .ok_or_else(|| AppError::Database("Database connection not available.".to_string()))?;
  f(conn)
}

/// Runs `f` inside a transaction: committed when `f` returns `Ok`, rolled back otherwise.
pub fn with_tx<T>(state: &DbState, f: impl FnOnce(&Transaction) -> AppResult<T>) -> AppResult<T> {
  let mut guard = state
    .0
    .lock()
    .map_err(|_| AppError::Database("Failed to acquire DB lock".to_string()))?;
  let conn = guard
    .as_mut()
    .ok_or_else(|| AppError::Database("Database connection not available.".to_string()))?;

  let tx = conn.transaction()?;
  let value = f(&tx)?;
  tx.commit()?;
  Ok(value)
}

/// Closes the current database connection, deletes the database file, and initializes a fresh database.
pub fn reset_database(state: &DbState, db_path: &PathBuf) -> AppResult<()> {
  log::info!("[db] Attempting to reset database...");

  let mut guard = state
    .0
    .lock()
    .map_err(|_| AppError::Database("Failed to acquire DB lock".to_string()))?;
  if let Some(conn) = guard.take() {
    if let Err((_, e)) = conn.close() {
      log::warn!("[db] Error closing database connection: {}", e);
    }
    log::info!("[db] Closed existing database connection.");
  }

  match fs::remove_file(db_path) {
    Ok(_) => log::info!("[db] Database file deleted successfully."),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      log::debug!("[db] Database file not found, skipping deletion.")
    }
    Err(e) => return Err(AppError::Database(format!("Failed to delete database file: {}", e))),
  }

  match initialize_database(db_path) {
    Ok(conn) => {
      *guard = Some(conn);
      log::info!("[db] Database reset and re-initialized successfully.");
      Ok(())
    }
    Err(e) => {
      log::error!("[db] Failed to re-initialize database: {}", e);
      Err(e)
    }
  }
}

#[cfg(test)]
pub fn test_state() -> DbState {
  DbState::new(open_in_memory().expect("in-memory database"))
}
