//! Persistence layer for the storefront backend.
//!
//! Four trait seams — [`CatalogStore`], [`StockLedger`], [`OrderStore`],
//! [`CartStore`] — with two implementations: [`InMemoryStore`] for tests and
//! development, and [`PgStore`] backed by PostgreSQL. The order-mutating
//! operations are composite and atomic; see the `orders` module docs.

pub mod cart;
pub mod catalog;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod orders;
pub mod postgres;

pub use cart::{CartAddOutcome, CartItem, CartStore};
pub use catalog::CatalogStore;
pub use error::{Result, StoreError};
pub use ledger::StockLedger;
pub use memory::InMemoryStore;
pub use orders::{
    CheckoutPlan, FinalizeOutcome, OrderStore, PlaceOutcome, RollbackOutcome, StockIssue,
};
pub use postgres::PgStore;

/// The full store surface the checkout path is generic over.
pub trait Store: CatalogStore + StockLedger + OrderStore + CartStore {}

impl<T: CatalogStore + StockLedger + OrderStore + CartStore> Store for T {}
