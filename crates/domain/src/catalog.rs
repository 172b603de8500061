//! Catalog records consumed by the order path.
//!
//! Products, colors, sizes, and users are owned by external collaborators;
//! the order path only reads them (and writes back the user's delivery
//! fields at checkout).

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::order::DeliveryInfo;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an ID from a raw string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Product identifier.
    ProductId
}
string_id! {
    /// Color identifier.
    ColorId
}
string_id! {
    /// Size identifier.
    SizeId
}
string_id! {
    /// User identifier.
    UserId
}

/// A sellable product with the color/size combinations it offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Price charged per unit at checkout.
    pub sell_price: Money,
    /// Colors this product is offered in.
    pub colors: Vec<ColorId>,
    /// Sizes this product is offered in.
    pub sizes: Vec<SizeId>,
}

impl Product {
    /// Returns true if the product is offered in the given color.
    pub fn offers_color(&self, color: &ColorId) -> bool {
        self.colors.contains(color)
    }

    /// Returns true if the product is offered in the given size.
    pub fn offers_size(&self, size: &SizeId) -> bool {
        self.sizes.contains(size)
    }
}

/// A product color option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub id: ColorId,
    pub name: String,
}

/// A product size option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub id: SizeId,
    pub name: String,
}

/// A storefront user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub phone: String,
    pub address: String,
}

impl User {
    /// Overwrites the delivery fields with the info supplied at checkout.
    pub fn apply_delivery(&mut self, delivery: &DeliveryInfo) {
        self.full_name = delivery.full_name.clone();
        self.phone = delivery.phone.clone();
        self.address = delivery.address.clone();
    }
}

/// Key of one inventory counter: a (product, color, size) combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockCell {
    pub product: ProductId,
    pub color: ColorId,
    pub size: SizeId,
}

impl StockCell {
    /// Builds a cell key.
    pub fn new(product: ProductId, color: ColorId, size: SizeId) -> Self {
        Self {
            product,
            color,
            size,
        }
    }
}

impl std::fmt::Display for StockCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.product, self.color, self.size)
    }
}
