//! Order status machine.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// ```text
/// Pending ──► Confirmed ──► Shipped ──► Delivered
///    │
///    └──► (rolled back / deleted on payment failure)   Cancelled
/// ```
///
/// Orders paid on delivery or by bank transfer are confirmed at creation;
/// gateway-paid orders stay `Pending` until the payment callback is
/// reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, awaiting payment confirmation.
    #[default]
    Pending,

    /// Payment settled (or not required up front); ready for fulfilment.
    Confirmed,

    /// Handed to the carrier.
    Shipped,

    /// Received by the customer (terminal).
    Delivered,

    /// Cancelled (terminal).
    Cancelled,
}

impl OrderStatus {
    /// Returns true while a gateway callback may still settle this order.
    pub fn is_awaiting_payment(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true once no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a stored status name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
