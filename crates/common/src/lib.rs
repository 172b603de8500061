//! Shared identifier types used across the storefront backend.

pub mod types;

pub use types::{LineId, OrderId};
