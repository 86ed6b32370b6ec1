#[cfg(feature = "desktop")]
pub mod commands;
pub mod models;
pub mod service;
pub mod withdrawals;

pub use models::*;
pub use service::WalletService;
pub use withdrawals::WithdrawalService;
