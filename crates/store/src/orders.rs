//! Order persistence with composite atomic operations.
//!
//! The three mutating operations (`place_order`, `finalize_payment`,
//! `rollback_order`) each execute as one atomic unit: a single write-lock
//! critical section in the in-memory store, a single transaction in the
//! PostgreSQL store. A partially-built order — some stock decremented but
//! no lines billed, or an order deleted while its stock stays reserved —
//! cannot be observed through this interface.

use async_trait::async_trait;
use common::OrderId;
use domain::{Order, OrderLine, StockCell, UserId};
use serde::Serialize;

use crate::error::Result;

/// A fully resolved checkout attempt: the pending order header and the
/// lines to bill, with unit prices captured from the catalog.
#[derive(Debug, Clone)]
pub struct CheckoutPlan {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

/// Why a line in a checkout plan could not be satisfied by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StockIssue {
    /// The ledger has no cell for this combination.
    Missing { cell: StockCell },
    /// The cell exists but holds less than the requested quantity.
    Insufficient {
        cell: StockCell,
        requested: u32,
        available: u32,
    },
}

impl StockIssue {
    /// Returns the cell the issue refers to.
    pub fn cell(&self) -> &StockCell {
        match self {
            StockIssue::Missing { cell } | StockIssue::Insufficient { cell, .. } => cell,
        }
    }
}

/// Outcome of attempting to place an order.
#[derive(Debug, Clone)]
pub enum PlaceOutcome {
    /// Every reservation succeeded; the order, its lines, and the computed
    /// total are durable.
    Placed { order: Order, lines: Vec<OrderLine> },
    /// At least one line could not be satisfied; nothing was persisted and
    /// no stock was touched. Carries one issue per failing line.
    Rejected(Vec<StockIssue>),
}

/// Outcome of recording a successful payment callback.
#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
    /// The order was awaiting payment and is now confirmed.
    Finalized(Order),
    /// The order had already left the awaiting-payment state; nothing was
    /// mutated.
    AlreadyFinalized,
    /// No such order.
    NotFound,
}

/// Outcome of rolling an order back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// Every line's stock was restored and the order was deleted.
    RolledBack,
    /// No such order; a concurrent rollback or cancellation already handled
    /// it.
    NotFound,
}

/// Order storage.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Attempts every stock decrement in the plan and, only if all succeed,
    /// persists the order header, all lines, and the total recomputed from
    /// the lines — atomically. Any shortfall aborts the whole operation
    /// with the full issue list and zero side effects.
    async fn place_order(&self, plan: CheckoutPlan) -> Result<PlaceOutcome>;

    /// Records the gateway transaction and flips the order from awaiting
    /// payment to confirmed — atomically, only if it is still awaiting
    /// payment. A replayed callback observes `AlreadyFinalized`.
    async fn finalize_payment(
        &self,
        id: &OrderId,
        txn: domain::GatewayTxn,
    ) -> Result<FinalizeOutcome>;

    /// Restores the reserved stock of every line and deletes the order and
    /// its lines — atomically. A missing order is reported as `NotFound`,
    /// not an error, so the operation is safe to repeat.
    async fn rollback_order(&self, id: &OrderId) -> Result<RollbackOutcome>;

    /// Loads an order by ID.
    async fn order(&self, id: &OrderId) -> Result<Option<Order>>;

    /// Loads an order by ID, scoped to its owning user.
    async fn order_for_user(&self, user: &UserId, id: &OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, newest first.
    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>>;

    /// Loads the lines of an order, in insertion order.
    async fn lines(&self, id: &OrderId) -> Result<Vec<OrderLine>>;
}
