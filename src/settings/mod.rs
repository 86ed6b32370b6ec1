pub mod service;
pub mod types;

#[cfg(feature = "desktop")]
pub mod commands;

pub use service::*;
pub use types::*;
