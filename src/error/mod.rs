//! Centralized error handling for the lendmarket workflow engine
//!
//! Every workflow transition reports failures through [`WorkflowError`];
//! a failed call performs no writes, so callers can retry or surface the
//! error without reconciliation.

use thiserror::Error;

/// Workflow error taxonomy
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("No eligible records for batch operation")]
    NoEligibleRecords,

    #[error("Database error: {0}")]
    Database(String),
}

impl WorkflowError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "VALIDATION_ERROR",
            WorkflowError::AccessDenied(_) => "ACCESS_DENIED",
            WorkflowError::NotFound(_) => "NOT_FOUND",
            WorkflowError::Conflict(_) => "CONFLICT",
            WorkflowError::NoEligibleRecords => "NO_ELIGIBLE_RECORDS",
            WorkflowError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Whether the error is caused by the caller rather than the store
    pub fn is_client_error(&self) -> bool {
        !matches!(self, WorkflowError::Database(_))
    }
}

// Convenience conversions from common error types

impl From<sqlx::Error> for WorkflowError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => WorkflowError::NotFound("record not found".to_string()),
            _ => WorkflowError::Database(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for WorkflowError {
    fn from(err: validator::ValidationErrors) -> Self {
        WorkflowError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        WorkflowError::Validation(format!("invalid payload: {}", err))
    }
}

/// Result type alias using WorkflowError
pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            WorkflowError::Validation("empty bank list".to_string()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            WorkflowError::AccessDenied("role".to_string()).error_code(),
            "ACCESS_DENIED"
        );
        assert_eq!(
            WorkflowError::NotFound("application".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            WorkflowError::Conflict("offer already rejected".to_string()).error_code(),
            "CONFLICT"
        );
        assert_eq!(
            WorkflowError::NoEligibleRecords.error_code(),
            "NO_ELIGIBLE_RECORDS"
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(WorkflowError::Validation("x".to_string()).is_client_error());
        assert!(WorkflowError::NoEligibleRecords.is_client_error());
        assert!(!WorkflowError::Database("connection reset".to_string()).is_client_error());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: WorkflowError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
