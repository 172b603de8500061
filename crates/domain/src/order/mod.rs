//! The order aggregate: header, lines, payment fields.

mod request;
mod status;

pub use request::{ItemRequest, OrderRequest};
pub use status::OrderStatus;

use chrono::{DateTime, Utc};
use common::{LineId, OrderId};
use serde::{Deserialize, Serialize};

use crate::catalog::{ColorId, ProductId, SizeId, StockCell, UserId};
use crate::money::Money;

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery; the order is confirmed immediately.
    CashOnDelivery,
    /// Manual bank transfer; the order is confirmed immediately.
    BankTransfer,
    /// Hosted payment gateway; the order stays pending until the
    /// asynchronous callback settles it.
    Gateway,
}

impl PaymentMethod {
    /// Returns true if paying through the hosted gateway.
    pub fn is_gateway(&self) -> bool {
        matches!(self, PaymentMethod::Gateway)
    }

    /// Returns the method name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Gateway => "gateway",
        }
    }

    /// Parses a stored method name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash_on_delivery" => Some(PaymentMethod::CashOnDelivery),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "gateway" => Some(PaymentMethod::Gateway),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delivery details supplied with every order request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub full_name: String,
    pub phone: String,
    pub address: String,
}

/// Transaction details reported by the gateway on a successful payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayTxn {
    pub bank_code: String,
    pub txn_no: String,
    pub response_code: String,
    pub txn_status: String,
}

/// An order header. Lines are owned exclusively by the order and are
/// deleted with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user: UserId,
    pub status: OrderStatus,
    /// Always equal to the sum of the line subtotals in any durable state.
    pub total_price: Money,
    pub payment_method: PaymentMethod,
    pub gateway_txn: Option<GatewayTxn>,
    pub delivery: DeliveryInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new pending order header with a zero total.
    pub fn pending(user: UserId, payment_method: PaymentMethod, delivery: DeliveryInfo) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::generate(),
            user,
            status: OrderStatus::Pending,
            total_price: Money::zero(),
            payment_method,
            gateway_txn: None,
            delivery,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true while the gateway callback may still settle this order.
    pub fn is_awaiting_payment(&self) -> bool {
        self.status.is_awaiting_payment()
    }
}

/// One line of an order: a (product, color, size) at a quantity, priced at
/// the unit sell price captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: LineId,
    pub order: OrderId,
    pub product: ProductId,
    pub color: ColorId,
    pub size: SizeId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    /// Returns the line subtotal: `quantity × unit_price`.
    pub fn subtotal(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    /// Returns the stock cell this line reserved against.
    pub fn stock_cell(&self) -> StockCell {
        StockCell::new(self.product.clone(), self.color.clone(), self.size.clone())
    }
}
