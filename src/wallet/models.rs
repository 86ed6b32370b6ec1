use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::validation::{FieldError, Rules, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "wallet.ts")]
pub enum TransactionKind {
    Deposit,
    EntryFee,
    Prize,
    Withdrawal,
    Refund,
    Adjustment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::EntryFee => "entry_fee",
            TransactionKind::Prize => "prize",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Refund => "refund",
            TransactionKind::Adjustment => "adjustment",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "deposit" => TransactionKind::Deposit,
            "entry_fee" => TransactionKind::EntryFee,
            "prize" => TransactionKind::Prize,
            "withdrawal" => TransactionKind::Withdrawal,
            "refund" => TransactionKind::Refund,
            _ => TransactionKind::Adjustment,
        }
    }
}

/// One ledger row. `amount` is signed: credits are positive, debits negative.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "wallet.ts")]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub kind: TransactionKind,
    pub amount: i64,
    pub balance_after: i64,
    /// Id of the tournament or withdrawal request this entry belongs to.
    pub reference: Option<String>,
    pub description: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "wallet.ts")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "approved" => WithdrawalStatus::Approved,
            "rejected" => WithdrawalStatus::Rejected,
            _ => WithdrawalStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "wallet.ts")]
pub struct WithdrawalRequest {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub method: String,
    pub account_details: String,
    pub status: WithdrawalStatus,
    pub admin_note: Option<String>,
    pub created_at: String,
    pub processed_at: Option<String>,
}

pub const WITHDRAWAL_METHODS: &[&str] = &["upi", "bank_transfer", "paypal"];

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "wallet.ts")]
pub struct WithdrawalForm {
    pub amount: i64,
    pub method: String,
    pub account_details: String,
}

impl Validate for WithdrawalForm {
    fn validate(&self) -> Vec<FieldError> {
        Rules::new()
            .positive_amount("amount", self.amount)
            .one_of("method", &self.method, WITHDRAWAL_METHODS)
            .length_between("account_details", &self.account_details, 4, 200)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "wallet.ts")]
pub struct DepositRequest {
    pub user_id: String,
    pub amount: i64,
    /// Payment id issued by the gateway.
    pub reference: String,
}

impl Validate for DepositRequest {
    fn validate(&self) -> Vec<FieldError> {
        Rules::new()
            .positive_amount("amount", self.amount)
            .required("reference", &self.reference)
            .finish()
    }
}
