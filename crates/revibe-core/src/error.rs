//! Error types for the core library.

use thiserror::Error;

use crate::items::ValidationError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Embedded database operation failed.
    #[error("Storage error in {operation}: {source}")]
    Storage {
        /// Store operation that failed (e.g., `add_item`).
        operation: &'static str,
        /// Underlying engine error.
        #[source]
        source: sqlx::Error,
    },

    /// Caller-supplied data was rejected before reaching the store.
    #[error("Validation failed: {}", format_validation(.0))]
    Validation(Vec<ValidationError>),

    /// Remote authority was unreachable or rejected the request.
    #[error("Remote error: {0}")]
    Remote(#[from] revibe_auth::Error),

    /// Network state could not be determined.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns a closure tagging an engine error with the failing operation.
    pub(crate) fn storage(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Storage { operation, source }
    }
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::message)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_names_operation() {
        let err = Error::storage("fetch_item_by_id")(sqlx::Error::RowNotFound);
        let text = err.to_string();
        assert!(text.contains("fetch_item_by_id"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_validation_error_lists_messages() {
        let err = Error::Validation(vec![
            ValidationError::EmptyTitle,
            ValidationError::EmptyDescription,
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: Title is required, Description is required"
        );
    }
}
