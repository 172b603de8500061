//! Checkout error taxonomy.

use domain::{ColorId, DomainError, ProductId, SizeId, UserId};
use serde::Serialize;
use store::StoreError;
use thiserror::Error;

/// Why one requested item could not be ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueReason {
    /// The product, color, size, or their combination does not exist.
    NotFound { what: String },
    /// The stock cell holds less than the requested quantity.
    InsufficientStock { requested: u32, available: u32 },
}

/// One failing item of an order request, by input position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemIssue {
    pub index: usize,
    pub product_id: ProductId,
    pub color_id: ColorId,
    pub size_id: SizeId,
    #[serde(flatten)]
    pub reason: IssueReason,
}

impl std::fmt::Display for ItemIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            IssueReason::NotFound { what } => {
                write!(f, "item {}: {} not found", self.index, what)
            }
            IssueReason::InsufficientStock {
                requested,
                available,
            } => write!(
                f,
                "item {}: not enough stock for {}/{}/{} (requested {}, available {})",
                self.index, self.product_id, self.color_id, self.size_id, requested, available
            ),
        }
    }
}

/// Errors from the gateway adapter.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The redirect request did not complete within the deadline.
    #[error("gateway request timed out")]
    Timeout,

    /// The gateway refused the request.
    #[error("gateway rejected the request: {0}")]
    Rejected(String),

    /// The gateway could not be reached.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the order builder and payment reconciler.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The request failed structural validation; nothing was mutated.
    #[error(transparent)]
    Validation(#[from] DomainError),

    /// The requesting user does not exist.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// One or more items could not be ordered; the whole attempt was
    /// rolled back. Carries every failing item.
    #[error("order rejected: {} failing item(s)", .0.len())]
    Rejected(Vec<ItemIssue>),

    /// Building the payment redirect failed; the placed order was rolled
    /// back before this surfaced.
    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The persistence layer failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_issue_display() {
        let issue = ItemIssue {
            index: 2,
            product_id: ProductId::new("P001"),
            color_id: ColorId::new("C01"),
            size_id: SizeId::new("M"),
            reason: IssueReason::InsufficientStock {
                requested: 10,
                available: 5,
            },
        };
        assert_eq!(
            issue.to_string(),
            "item 2: not enough stock for P001/C01/M (requested 10, available 5)"
        );
    }

    #[test]
    fn test_item_issue_serializes_flat() {
        let issue = ItemIssue {
            index: 0,
            product_id: ProductId::new("P001"),
            color_id: ColorId::new("C01"),
            size_id: SizeId::new("M"),
            reason: IssueReason::NotFound {
                what: "product 'P001'".to_string(),
            },
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["kind"], "not_found");
        assert_eq!(json["product_id"], "P001");
    }
}
