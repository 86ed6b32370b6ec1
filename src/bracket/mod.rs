#[cfg(feature = "desktop")]
pub mod commands;
pub mod model;
pub mod service;

pub use model::*;
pub use service::{BracketService, MatchResult};
