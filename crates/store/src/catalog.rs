//! Read access to catalog records owned by external collaborators.

use async_trait::async_trait;
use domain::{Color, ColorId, DeliveryInfo, Product, ProductId, Size, SizeId, User, UserId};

use crate::error::Result;

/// Lookup-by-id access to products, colors, sizes, and users, plus the one
/// write the order path performs: updating a user's delivery fields.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Looks up a product by ID.
    async fn product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Looks up a color by ID.
    async fn color(&self, id: &ColorId) -> Result<Option<Color>>;

    /// Looks up a size by ID.
    async fn size(&self, id: &SizeId) -> Result<Option<Size>>;

    /// Looks up a user by ID.
    async fn user(&self, id: &UserId) -> Result<Option<User>>;

    /// Overwrites the user's delivery fields with the info supplied at
    /// checkout. Fails with `UserNotFound` for unknown users.
    async fn update_delivery(&self, id: &UserId, delivery: &DeliveryInfo) -> Result<()>;
}
