//! Domain layer for the storefront backend.
//!
//! This crate provides the core domain model:
//! - catalog records (products, colors, sizes, users) and their typed IDs
//! - `Money` in integer minor units
//! - the `Order` aggregate with its lines, status machine, and payment fields
//! - order request validation

pub mod catalog;
pub mod error;
pub mod money;
pub mod order;

pub use catalog::{Color, ColorId, Product, ProductId, Size, SizeId, StockCell, User, UserId};
pub use error::DomainError;
pub use money::Money;
pub use order::{
    DeliveryInfo, GatewayTxn, ItemRequest, Order, OrderLine, OrderRequest, OrderStatus,
    PaymentMethod,
};
