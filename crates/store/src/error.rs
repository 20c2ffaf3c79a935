use thiserror::Error;

use domain::OrderError;

/// Errors surfaced by order stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A domain rule rejected the operation. Recoverable by the
    /// caller; the transaction was rolled back.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The database failed. The transaction was rolled back; nothing
    /// was committed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// The domain error behind this failure, if any.
    pub fn as_order_error(&self) -> Option<&OrderError> {
        match self {
            StoreError::Order(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
