//! Checkout core for the storefront backend.
//!
//! Three pieces around the order path:
//! 1. [`OrderBuilder`] — validates a requested item list, reserves stock,
//!    and persists the order all-or-nothing.
//! 2. The gateway adapter — builds signed hosted-payment redirects and
//!    verifies callback signatures (HMAC-SHA512).
//! 3. [`PaymentReconciler`] — consumes verified callbacks, finalizing the
//!    order or rolling it back with its reserved stock.

pub mod builder;
pub mod error;
pub mod gateway;
pub mod reconciler;

pub use builder::{Checkout, OrderBuilder};
pub use error::{CheckoutError, GatewayError, IssueReason, ItemIssue};
pub use gateway::{
    GatewayConfig, HostedGateway, PaymentGateway, RedirectRequest, sign_params, verify_signature,
};
pub use reconciler::{CallbackPayload, PaymentReconciler, ReconcileOutcome, codes};
