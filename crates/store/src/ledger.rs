//! The stock ledger: one non-negative counter per (product, color, size).

use async_trait::async_trait;
use domain::StockCell;

use crate::error::Result;

/// Authoritative available-quantity counter per stock cell.
///
/// `reserve` is an atomic check-and-decrement: it commits only when
/// `available >= qty` and otherwise fails without side effect. Two
/// concurrent reservations on the same cell serialize, so the counter can
/// never be driven below zero. `release` increments unconditionally;
/// idempotency is the caller's responsibility.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Returns the available quantity for a cell, or `None` for an unknown
    /// cell.
    async fn available(&self, cell: &StockCell) -> Result<Option<u32>>;

    /// Atomically decrements the cell by `qty` if enough stock is
    /// available. Fails with `Insufficient` (no side effect) otherwise, or
    /// `UnknownCell` if the cell does not exist.
    async fn reserve(&self, cell: &StockCell, qty: u32) -> Result<()>;

    /// Increments the cell by `qty`. Fails with `UnknownCell` if the cell
    /// does not exist.
    async fn release(&self, cell: &StockCell, qty: u32) -> Result<()>;
}
