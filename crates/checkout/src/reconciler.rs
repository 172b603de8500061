//! The payment reconciler: consumes verified gateway callbacks and settles
//! or rolls back the referenced order.

use std::collections::BTreeMap;

use common::OrderId;
use domain::GatewayTxn;
use store::{FinalizeOutcome, OrderStore, RollbackOutcome};

use crate::error::CheckoutError;
use crate::gateway::{self, keys, verify_signature};

/// Result codes answered to the gateway, mirroring its own convention.
pub mod codes {
    /// Callback accepted and processed.
    pub const SUCCESS: &str = "00";
    /// The referenced order does not exist (or was already rolled back).
    pub const ORDER_NOT_FOUND: &str = "01";
    /// The order was already settled; nothing was re-processed.
    pub const ALREADY_CONFIRMED: &str = "02";
    /// The callback amount does not match the order total.
    pub const INVALID_AMOUNT: &str = "04";
    /// The signature did not verify; nothing was read or mutated.
    pub const INVALID_SIGNATURE: &str = "97";
    /// The payload is missing required fields.
    pub const MALFORMED: &str = "99";
}

/// Structured answer for the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub code: &'static str,
    pub message: &'static str,
}

impl ReconcileOutcome {
    fn answer(code: &'static str, message: &'static str) -> Self {
        metrics::counter!("payment_callbacks_total", "code" => code).increment(1);
        Self { code, message }
    }
}

/// A parsed gateway callback.
#[derive(Debug, Clone)]
pub struct CallbackPayload {
    /// The full parameter map, kept for signature verification.
    pub params: BTreeMap<String, String>,
    pub txn_ref: String,
    /// Wire amount: minor units times 100.
    pub amount: i64,
    pub response_code: String,
    pub bank_code: String,
    pub txn_no: String,
    pub txn_status: String,
}

impl CallbackPayload {
    /// Parses the callback parameter map. Returns `None` when a required
    /// field is missing or unparseable; the caller answers `99`.
    pub fn from_params(params: BTreeMap<String, String>) -> Option<Self> {
        let txn_ref = params.get(keys::TXN_REF)?.clone();
        let amount: i64 = params.get(keys::AMOUNT)?.parse().ok()?;
        let response_code = params.get(keys::RESPONSE_CODE)?.clone();
        let bank_code = params.get(keys::BANK_CODE).cloned().unwrap_or_default();
        let txn_no = params.get(keys::TXN_NO).cloned().unwrap_or_default();
        let txn_status = params.get(keys::TXN_STATUS).cloned().unwrap_or_default();
        Some(Self {
            params,
            txn_ref,
            amount,
            response_code,
            bank_code,
            txn_no,
            txn_status,
        })
    }
}

/// Settles or rolls back orders from gateway callbacks.
///
/// State machine per order: `pending` either finalizes (success code) or
/// rolls back (any decline, or an amount mismatch); both ends are terminal.
/// Replays and races resolve through the store's atomic check-and-set
/// operations, never through a second mutation.
pub struct PaymentReconciler<S> {
    store: S,
    secret: String,
}

impl<S: OrderStore> PaymentReconciler<S> {
    /// Creates a reconciler verifying callbacks against `secret`.
    pub fn new(store: S, secret: impl Into<String>) -> Self {
        Self {
            store,
            secret: secret.into(),
        }
    }

    /// Processes one callback parameter map and reports the outcome code.
    #[tracing::instrument(skip(self, params))]
    pub async fn reconcile(
        &self,
        params: BTreeMap<String, String>,
    ) -> Result<ReconcileOutcome, CheckoutError> {
        let Some(payload) = CallbackPayload::from_params(params) else {
            return Ok(ReconcileOutcome::answer(codes::MALFORMED, "Invalid request"));
        };

        if !verify_signature(&payload.params, &self.secret) {
            tracing::warn!(txn_ref = %payload.txn_ref, "callback signature rejected");
            return Ok(ReconcileOutcome::answer(
                codes::INVALID_SIGNATURE,
                "Invalid signature",
            ));
        }

        let order_id = OrderId::from_raw(payload.txn_ref.clone());
        let Some(order) = self.store.order(&order_id).await? else {
            // Creation rollback or a concurrent cancellation already
            // removed the order; this is a handled terminal state.
            return Ok(ReconcileOutcome::answer(
                codes::ORDER_NOT_FOUND,
                "Order not found",
            ));
        };

        if !order.is_awaiting_payment() {
            return Ok(ReconcileOutcome::answer(
                codes::ALREADY_CONFIRMED,
                "Order already updated",
            ));
        }

        if payload.amount != order.total_price.cents() * 100 {
            tracing::warn!(
                order_id = %order_id,
                callback_amount = payload.amount,
                "callback amount mismatch, rolling back"
            );
            return Ok(match self.store.rollback_order(&order_id).await? {
                RollbackOutcome::RolledBack => {
                    ReconcileOutcome::answer(codes::INVALID_AMOUNT, "Invalid amount")
                }
                RollbackOutcome::NotFound => {
                    ReconcileOutcome::answer(codes::ORDER_NOT_FOUND, "Order not found")
                }
            });
        }

        if payload.response_code == gateway::RESPONSE_SUCCESS {
            let txn = GatewayTxn {
                bank_code: payload.bank_code,
                txn_no: payload.txn_no,
                response_code: payload.response_code,
                txn_status: payload.txn_status,
            };
            return Ok(match self.store.finalize_payment(&order_id, txn).await? {
                FinalizeOutcome::Finalized(order) => {
                    tracing::info!(order_id = %order.id, "payment confirmed");
                    ReconcileOutcome::answer(codes::SUCCESS, "Confirm success")
                }
                // A replay or a concurrent callback won the check-and-set.
                FinalizeOutcome::AlreadyFinalized => {
                    ReconcileOutcome::answer(codes::ALREADY_CONFIRMED, "Order already updated")
                }
                FinalizeOutcome::NotFound => {
                    ReconcileOutcome::answer(codes::ORDER_NOT_FOUND, "Order not found")
                }
            });
        }

        // Declined payment: restore every line's stock and delete the order.
        tracing::info!(
            order_id = %order_id,
            response_code = %payload.response_code,
            "payment declined, rolling back order"
        );
        Ok(match self.store.rollback_order(&order_id).await? {
            RollbackOutcome::RolledBack => ReconcileOutcome::answer(
                codes::SUCCESS,
                "Transaction failed, order rolled back and stock restored",
            ),
            RollbackOutcome::NotFound => {
                ReconcileOutcome::answer(codes::ORDER_NOT_FOUND, "Order not found")
            }
        })
    }
}
