//! Field-level form validation.
//!
//! Request structs implement [`Validate`] by listing their rules; the service layer calls
//! [`ensure_valid`] before touching the database so the frontend gets every failing field at once.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::constants::MAX_AMOUNT;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "errors.ts")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub trait Validate {
    fn validate(&self) -> Vec<FieldError>;
}

/// Fail with `AppError::Validation` if any rule of `value` fails.
pub fn ensure_valid(value: &impl Validate) -> AppResult<()> {
    let errors = value.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Collects failures while a request's rules are checked one after another.
#[derive(Debug, Default)]
pub struct Rules {
    errors: Vec<FieldError>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, field: &str, message: String) -> &mut Self {
        // First failure per field wins.
        if !self.errors.iter().any(|e| e.field == field) {
            self.errors.push(FieldError::new(field, message));
        }
        self
    }

    pub fn check(&mut self, field: &str, ok: bool, message: &str) -> &mut Self {
        if !ok {
            self.push(field, message.to_string());
        }
        self
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.push(field, format!("{} is required", label(field)));
        }
        self
    }

    pub fn length_between(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let len = value.trim().chars().count();
        if len < min || len > max {
            self.push(
                field,
                format!("{} must be between {} and {} characters", label(field), min, max),
            );
        }
        self
    }

    pub fn max_length(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        if value.chars().count() > max {
            self.push(field, format!("{} must be at most {} characters", label(field), max));
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if !is_email(value) {
            self.push(field, "Enter a valid email address".to_string());
        }
        self
    }

    pub fn url(&mut self, field: &str, value: &str) -> &mut Self {
        if !is_http_url(value) {
            self.push(field, "Enter a valid http(s) URL".to_string());
        }
        self
    }

    pub fn positive_amount(&mut self, field: &str, value: i64) -> &mut Self {
        if value <= 0 {
            self.push(field, format!("{} must be greater than zero", label(field)));
        }
        self.max_amount(field, value)
    }

    pub fn non_negative_amount(&mut self, field: &str, value: i64) -> &mut Self {
        if value < 0 {
            self.push(field, format!("{} cannot be negative", label(field)));
        }
        self.max_amount(field, value)
    }

    /// Caps money fields at [`MAX_AMOUNT`] in either direction.
    pub fn max_amount(&mut self, field: &str, value: i64) -> &mut Self {
        if value.checked_abs().map_or(true, |v| v > MAX_AMOUNT) {
            self.push(field, format!("{} cannot exceed {}", label(field), MAX_AMOUNT));
        }
        self
    }

    pub fn range(&mut self, field: &str, value: i64, min: i64, max: i64) -> &mut Self {
        if value < min || value > max {
            self.push(field, format!("{} must be between {} and {}", label(field), min, max));
        }
        self
    }

    pub fn rfc3339(&mut self, field: &str, value: &str) -> &mut Self {
        if chrono::DateTime::parse_from_rfc3339(value).is_err() {
            self.push(field, format!("{} must be a valid date and time", label(field)));
        }
        self
    }

    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) -> &mut Self {
        if !allowed.contains(&value) {
            self.push(field, format!("{} must be one of: {}", label(field), allowed.join(", ")));
        }
        self
    }

    pub fn finish(&mut self) -> Vec<FieldError> {
        std::mem::take(&mut self.errors)
    }
}

// "entry_fee" -> "Entry fee"
fn label(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

pub fn is_email(value: &str) -> bool {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

pub fn is_http_url(value: &str) -> bool {
    match url::Url::parse(value.trim()) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

/// Lower-case, dash-separated form of a display name.
pub fn slugify(value: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for c in value.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
