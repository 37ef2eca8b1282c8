//! The module contains the errors a repository can return.
//!
//! A lookup that finds nothing is never an error: it is `Ok(None)` (or
//! `Ok(false)` for deletes). Everything else falls in one of these buckets:
//!
//! - [`Validation`] input rejected before it reaches storage.
//! - [`InvalidState`] the operation would break a documented invariant
//!   (cyclic category move, archiving without a replacement, ...).
//! - [`Conflict`] storage rejected the write on a unique constraint.
//! - [`Storage`] any other driver/connection/constraint failure.
//!
//!  [`Validation`]: RepositoryError::Validation
//!  [`InvalidState`]: RepositoryError::InvalidState
//!  [`Conflict`]: RepositoryError::Conflict
//!  [`Storage`]: RepositoryError::Storage
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use uuid::Uuid;

/// Repository custom errors.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Failed to {operation}: {message}")]
    Conflict { operation: String, message: String },
    #[error("Failed to {operation}: {source}")]
    Storage {
        operation: String,
        #[source]
        source: DbErr,
    },
}

/// Coarse classification used by callers that map errors to responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InvariantViolation,
    Storage,
}

impl RepositoryError {
    /// Wraps a storage error, keeping unique-constraint failures apart.
    pub(crate) fn storage(operation: impl Into<String>, err: DbErr) -> Self {
        let operation = operation.into();
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(message)) => Self::Conflict { operation, message },
            _ => Self::Storage {
                operation,
                source: err,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidState(_) | Self::Conflict { .. } => ErrorKind::InvariantViolation,
            Self::Storage { .. } => ErrorKind::Storage,
        }
    }
}

/// Attaches the failed operation to a storage result, logging it once at the
/// repository boundary.
pub(crate) trait StorageContext<T> {
    fn context(self, operation: &str) -> Result<T, RepositoryError>;

    /// Same as [`context`](Self::context), naming the target row in the log.
    fn context_id(self, operation: &str, id: Uuid) -> Result<T, RepositoryError>;
}

impl<T> StorageContext<T> for Result<T, DbErr> {
    fn context(self, operation: &str) -> Result<T, RepositoryError> {
        self.map_err(|err| {
            tracing::error!(operation, error = %err, "storage operation failed");
            RepositoryError::storage(operation, err)
        })
    }

    fn context_id(self, operation: &str, id: Uuid) -> Result<T, RepositoryError> {
        self.map_err(|err| {
            tracing::error!(operation, %id, error = %err, "storage operation failed");
            RepositoryError::storage(operation, err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_message_is_prefixed_with_operation() {
        let err = RepositoryError::storage(
            "update account",
            DbErr::Custom("connection reset".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Failed to update account: Custom Error: connection reset"
        );
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn row_context_keeps_the_operation_and_error() {
        let failed: Result<(), DbErr> = Err(DbErr::Custom("disk full".to_string()));
        let err = failed
            .context_id("delete category", Uuid::new_v4())
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to delete category: Custom Error: disk full");
        assert_eq!(err.kind(), ErrorKind::Storage);

        let fine: Result<u8, DbErr> = Ok(7);
        assert_eq!(fine.context_id("find user", Uuid::nil()).unwrap(), 7);
    }

    #[test]
    fn validation_and_state_errors_are_classified() {
        assert_eq!(
            RepositoryError::Validation("name".to_string()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            RepositoryError::InvalidState("cycle".to_string()).kind(),
            ErrorKind::InvariantViolation
        );
    }
}
