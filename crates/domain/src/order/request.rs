//! Order request validation.

use serde::{Deserialize, Serialize};

use crate::catalog::{ColorId, ProductId, SizeId};
use crate::error::DomainError;
use crate::order::{DeliveryInfo, PaymentMethod};

/// One requested item: a (product, color, size) combination at a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRequest {
    pub product_id: ProductId,
    pub color_id: ColorId,
    pub size_id: SizeId,
    pub quantity: u32,
}

/// A checkout request: the selected items plus delivery details and the
/// chosen payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub items: Vec<ItemRequest>,
    pub delivery: DeliveryInfo,
    pub payment_method: PaymentMethod,
}

impl OrderRequest {
    /// Rejects structurally invalid requests before any mutation happens.
    ///
    /// Delivery name/phone/address must all be present, the item list must
    /// be non-empty, and every quantity must be positive.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.delivery.full_name.trim().is_empty() {
            return Err(DomainError::MissingField("full_name"));
        }
        if self.delivery.phone.trim().is_empty() {
            return Err(DomainError::MissingField("phone"));
        }
        if self.delivery.address.trim().is_empty() {
            return Err(DomainError::MissingField("address"));
        }
        if self.items.is_empty() {
            return Err(DomainError::EmptyOrder);
        }
        for (index, item) in self.items.iter().enumerate() {
            if item.quantity == 0 {
                return Err(DomainError::ZeroQuantity { index });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> OrderRequest {
        OrderRequest {
            items: vec![ItemRequest {
                product_id: ProductId::new("P001"),
                color_id: ColorId::new("C01"),
                size_id: SizeId::new("M"),
                quantity: 2,
            }],
            delivery: DeliveryInfo {
                full_name: "An Nguyen".to_string(),
                phone: "0900000001".to_string(),
                address: "12 Ly Thuong Kiet".to_string(),
            },
            payment_method: PaymentMethod::CashOnDelivery,
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_missing_delivery_fields_rejected() {
        let mut req = request();
        req.delivery.full_name = "  ".to_string();
        assert!(matches!(
            req.validate(),
            Err(DomainError::MissingField("full_name"))
        ));

        let mut req = request();
        req.delivery.phone = String::new();
        assert!(matches!(
            req.validate(),
            Err(DomainError::MissingField("phone"))
        ));

        let mut req = request();
        req.delivery.address = String::new();
        assert!(matches!(
            req.validate(),
            Err(DomainError::MissingField("address"))
        ));
    }

    #[test]
    fn test_empty_item_list_rejected() {
        let mut req = request();
        req.items.clear();
        assert!(matches!(req.validate(), Err(DomainError::EmptyOrder)));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut req = request();
        req.items[0].quantity = 0;
        assert!(matches!(
            req.validate(),
            Err(DomainError::ZeroQuantity { index: 0 })
        ));
    }
}
