//! Error type shared by every service, and the `{ success, error }` shape handed to the frontend.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::validation::FieldError;

/// Errors raised by the service layer.
#[derive(Debug, thiserror::Error, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "message")]
#[ts(export, export_to = "errors.ts")]
pub enum AppError {
    /// A database call failed.
    #[error("Database error: {0}")]
    Database(String),

    /// The requested record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// One or more form fields failed validation.
    #[error("Validation failed: {}", format_field_errors(.0))]
    Validation(Vec<FieldError>),

    /// No signed-in user, or the session expired.
    #[error("Not signed in")]
    Unauthorized,

    /// The signed-in user may not perform this action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The request conflicts with the current state of a record.
    #[error("{0}")]
    Conflict(String),

    /// The wallet balance does not cover the debit.
    #[error("Insufficient balance: {available} available, {required} required")]
    InsufficientFunds { available: i64, required: i64 },

    /// An invalid bracket operation.
    #[error("Bracket error: {0}")]
    Bracket(String),

    /// File storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The authentication backend rejected the request.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Missing or malformed configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => AppError::NotFound("Record".to_string()),
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<rusqlite_migration::Error> for AppError {
    fn from(e: rusqlite_migration::Error) -> Self {
        match e {
            rusqlite_migration::Error::RusqliteError { query: _, err } => {
                AppError::Database(format!("SQLite error during migration: {}", err))
            }
            rusqlite_migration::Error::MigrationDefinition(def_err) => {
                AppError::Database(format!("Migration definition error: {}", def_err))
            }
            other => AppError::Database(format!("Unknown migration error: {}", other)),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", e))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Auth(format!("Request failed: {}", e))
    }
}

impl From<image::ImageError> for AppError {
    fn from(e: image::ImageError) -> Self {
        AppError::Storage(format!("Invalid image: {}", e))
    }
}

/// What every command returns to the frontend, which shows `error` as a toast.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "errors.ts")]
pub struct ServiceResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    /// Per-field messages when the failure was a validation error.
    pub field_errors: Vec<FieldError>,
}

impl<T> ServiceResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            field_errors: Vec::new(),
        }
    }

    pub fn err(error: AppError) -> Self {
        log::warn!("[service] {}", error);
        let field_errors = match &error {
            AppError::Validation(fields) => fields.clone(),
            _ => Vec::new(),
        };
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            field_errors,
        }
    }
}

impl<T> From<AppResult<T>> for ServiceResult<T> {
    fn from(result: AppResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rows_maps_to_not_found() {
        let err: AppError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_service_result_carries_field_errors() {
        let result: ServiceResult<()> = Err(AppError::invalid("title", "Title is required")).into();
        assert!(!result.success);
        assert_eq!(result.field_errors.len(), 1);
        assert_eq!(result.field_errors[0].field, "title");
        assert_eq!(
            result.error.as_deref(),
            Some("Validation failed: title: Title is required")
        );
    }

    #[test]
    fn test_service_result_ok() {
        let result: ServiceResult<u32> = Ok(7).into();
        assert!(result.success);
        assert_eq!(result.data, Some(7));
        assert!(result.error.is_none());
    }
}
