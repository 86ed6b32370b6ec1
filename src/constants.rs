//! Shared constants used across the application.

// Database file inside the app data directory
pub const DB_FILE: &str = "tournament-hub.sqlite";

// Uploaded images live under this directory inside the app data directory
pub const STORAGE_DIR: &str = "storage";

// Preference storage
pub const PREFERENCES_STORE_PATH: &str = "user-preferences.json";
pub const PREFERENCES_KEY: &str = "preferences";

// Session persistence
pub const KEYRING_SERVICE: &str = "tournament-hub";
pub const SESSION_FILE: &str = "session.json";

// app_settings keys
pub const PAYMENT_SETTINGS_KEY: &str = "payment_gateway";

// Uploads
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
pub const MAX_IMAGE_WIDTH: u32 = 1600;
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

// Listing
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

// Money, in minor units
pub const MAX_AMOUNT: i64 = 100_000_000_000;
pub const MAX_BALANCE: i64 = 1_000_000_000_000_000;

// Tournament limits
pub const MIN_TEAMS: i64 = 2;
pub const MAX_TEAMS: i64 = 256;
pub const MAX_TEAM_SIZE: i64 = 10;

/// Clamp a requested page size into `1..=MAX_PAGE_SIZE`.
pub fn page_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}
