//! Domain error types.

use thiserror::Error;

/// Errors raised while validating an order request.
///
/// These are all rejected before any stock or order mutation happens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// A required delivery field is missing.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// No items were selected for the order.
    #[error("no products selected for the order")]
    EmptyOrder,

    /// An item was requested with a zero quantity.
    #[error("quantity must be greater than zero (item {index})")]
    ZeroQuantity { index: usize },
}
