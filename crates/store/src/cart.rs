//! Cart storage: one row per (user, product, color, size).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{StockCell, UserId};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One cart row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub cell: StockCell,
    pub quantity: u32,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of adding quantity to a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAddOutcome {
    /// The row was created or its quantity increased.
    Added(CartItem),
    /// The requested addition would exceed available stock. Reports how
    /// many more units the user could still add.
    Shortfall { available: u32, in_cart: u32 },
}

/// Cart storage. Additions are capped by the stock available at read time;
/// the hard guarantee stays with the ledger at checkout.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the user's cart rows.
    async fn cart_items(&self, user: &UserId) -> Result<Vec<CartItem>>;

    /// Adds `qty` to the user's row for this cell, creating it if absent.
    /// Fails with `UnknownCell` for combinations the ledger does not track.
    async fn add_item(&self, user: &UserId, cell: &StockCell, qty: u32) -> Result<CartAddOutcome>;

    /// Sets the row's quantity. Returns false if the row does not exist.
    async fn set_item(&self, user: &UserId, cell: &StockCell, qty: u32) -> Result<bool>;

    /// Removes the row. Returns false if it does not exist.
    async fn remove_item(&self, user: &UserId, cell: &StockCell) -> Result<bool>;

    /// Removes every row of the user's cart.
    async fn clear(&self, user: &UserId) -> Result<()>;
}
