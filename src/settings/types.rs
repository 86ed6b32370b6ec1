use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::validation::{FieldError, Rules, Validate};

/// Payment gateway the deposits are taken through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "settings.ts")]
pub enum PaymentProvider {
    Manual,
    Razorpay,
    Stripe,
    Paypal,
}

impl Default for PaymentProvider {
    fn default() -> Self {
        Self::Manual
    }
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Razorpay => "razorpay",
            Self::Stripe => "stripe",
            Self::Paypal => "paypal",
        }
    }

    /// Every provider except manual bookkeeping needs API keys.
    pub fn requires_keys(&self) -> bool {
        !matches!(self, Self::Manual)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "settings.ts")]
pub struct PaymentGatewaySettings {
    pub provider: PaymentProvider,
    pub public_key: String,
    pub secret_key: String,
    /// ISO 4217 code, e.g. "INR".
    pub currency: String,
    pub min_deposit: i64,
    pub min_withdrawal: i64,
    pub deposits_enabled: bool,
    pub withdrawals_enabled: bool,
}

impl Default for PaymentGatewaySettings {
    fn default() -> Self {
        Self {
            provider: PaymentProvider::default(),
            public_key: String::new(),
            secret_key: String::new(),
            currency: "INR".to_string(),
            min_deposit: 1000,
            min_withdrawal: 10000,
            deposits_enabled: true,
            withdrawals_enabled: true,
        }
    }
}

impl PaymentGatewaySettings {
    /// Copy safe to hand to any signed-in user: the secret is masked.
    pub fn public_view(&self) -> Self {
        Self {
            secret_key: mask_secret(&self.secret_key),
            ..self.clone()
        }
    }
}

impl Validate for PaymentGatewaySettings {
    fn validate(&self) -> Vec<FieldError> {
        let mut rules = Rules::new();
        rules
            .check(
                "currency",
                self.currency.len() == 3 && self.currency.chars().all(|c| c.is_ascii_uppercase()),
                "Currency must be a three letter ISO code",
            )
            .non_negative_amount("min_deposit", self.min_deposit)
            .non_negative_amount("min_withdrawal", self.min_withdrawal);
        if self.provider.requires_keys() {
            rules
                .required("public_key", &self.public_key)
                .required("secret_key", &self.secret_key);
        }
        rules.finish()
    }
}

// "sk_live_abcdef1234" -> "**************1234"
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let visible: String = secret.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), visible)
}
