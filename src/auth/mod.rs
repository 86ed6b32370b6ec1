#[cfg(feature = "desktop")]
pub mod commands;
pub mod guard;
pub mod jwt;
pub mod security;
pub mod service;
pub mod storage;
pub mod supabase;
pub mod types;

pub use guard::{require_admin, require_user, signed_in, signed_in_admin};
pub use service::{AuthContext, AuthService};
pub use storage::SessionStore;
pub use types::*;
