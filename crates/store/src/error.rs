use domain::{StockCell, UserId};
use thiserror::Error;

/// Errors that can occur when interacting with the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stock cell does not exist in the ledger.
    #[error("unknown stock cell: {0}")]
    UnknownCell(StockCell),

    /// The cell exists but does not hold enough stock for the request.
    #[error("insufficient stock for {cell}: requested {requested}, available {available}")]
    Insufficient {
        cell: StockCell,
        requested: u32,
        available: u32,
    },

    /// The user does not exist.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row failed to decode (unknown status or method name).
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
