#[cfg(feature = "desktop")]
pub mod commands;
pub mod models;
pub mod service;

pub use models::*;
pub use service::GameService;
