//! The order builder: turns a validated item selection into a durable order
//! with reserved stock, all-or-nothing.

use std::time::Duration;

use common::OrderId;
use domain::{Order, OrderLine, OrderRequest, OrderStatus, User, UserId};
use store::{CatalogStore, CheckoutPlan, OrderStore, PlaceOutcome, StockIssue};

use crate::error::{CheckoutError, GatewayError, IssueReason, ItemIssue};
use crate::gateway::{PaymentGateway, RedirectRequest};

/// Result of a successful checkout.
#[derive(Debug, Clone)]
pub enum Checkout {
    /// The order is durable and needs no further payment step.
    Placed {
        order: Order,
        lines: Vec<OrderLine>,
        user: User,
    },
    /// The order is durable and awaiting payment; send the customer to the
    /// gateway.
    Redirect {
        order_id: OrderId,
        redirect_url: String,
    },
}

/// Builds orders against a store and a payment gateway.
pub struct OrderBuilder<S, G> {
    store: S,
    gateway: G,
    gateway_timeout: Duration,
}

impl<S, G> OrderBuilder<S, G>
where
    S: CatalogStore + OrderStore,
    G: PaymentGateway,
{
    /// Creates a builder. `gateway_timeout` caps the redirect-URL call; on
    /// expiry the placed order is rolled back as if the gateway had failed.
    pub fn new(store: S, gateway: G, gateway_timeout: Duration) -> Self {
        Self {
            store,
            gateway,
            gateway_timeout,
        }
    }

    /// Creates an order from the requested items.
    ///
    /// The sequence is: validate the request, resolve every item against
    /// the catalog (collecting per-item errors, no mutation yet), then
    /// reserve stock and persist the order, its lines, and the total as one
    /// atomic store operation. Any failing item aborts the whole attempt
    /// and reports every failure. For gateway payment the redirect URL is
    /// requested last; failure or timeout there synchronously rolls the
    /// placed order back.
    #[tracing::instrument(skip(self, request), fields(user = %user_id))]
    pub async fn create_order(
        &self,
        user_id: &UserId,
        request: OrderRequest,
        client_ip: &str,
    ) -> Result<Checkout, CheckoutError> {
        let started = std::time::Instant::now();
        request.validate()?;

        let mut user = self
            .store
            .user(user_id)
            .await?
            .ok_or_else(|| CheckoutError::UserNotFound(user_id.clone()))?;

        let mut order = Order::pending(
            user_id.clone(),
            request.payment_method,
            request.delivery.clone(),
        );
        // Orders not settled through the gateway are confirmed at creation.
        if !request.payment_method.is_gateway() {
            order.status = OrderStatus::Confirmed;
        }

        // Resolve every item before touching any state.
        let mut issues = Vec::new();
        let mut lines = Vec::new();
        for (index, item) in request.items.iter().enumerate() {
            let not_found = |what: String| ItemIssue {
                index,
                product_id: item.product_id.clone(),
                color_id: item.color_id.clone(),
                size_id: item.size_id.clone(),
                reason: IssueReason::NotFound { what },
            };

            let Some(product) = self.store.product(&item.product_id).await? else {
                issues.push(not_found(format!("product '{}'", item.product_id)));
                continue;
            };
            if self.store.color(&item.color_id).await?.is_none() {
                issues.push(not_found(format!("color '{}'", item.color_id)));
                continue;
            }
            if self.store.size(&item.size_id).await?.is_none() {
                issues.push(not_found(format!("size '{}'", item.size_id)));
                continue;
            }
            if !product.offers_color(&item.color_id) {
                issues.push(not_found(format!(
                    "color '{}' for product '{}'",
                    item.color_id, product.id
                )));
                continue;
            }
            if !product.offers_size(&item.size_id) {
                issues.push(not_found(format!(
                    "size '{}' for product '{}'",
                    item.size_id, product.id
                )));
                continue;
            }

            lines.push(OrderLine {
                id: common::LineId::generate(),
                order: order.id.clone(),
                product: item.product_id.clone(),
                color: item.color_id.clone(),
                size: item.size_id.clone(),
                quantity: item.quantity,
                unit_price: product.sell_price,
            });
        }
        if !issues.is_empty() {
            metrics::counter!("checkout_rejected_total").increment(1);
            return Err(CheckoutError::Rejected(issues));
        }

        // Reserve stock and persist order + lines + total atomically.
        let order_id = order.id.clone();
        let placed = match self.store.place_order(CheckoutPlan { order, lines }).await? {
            PlaceOutcome::Placed { order, lines } => (order, lines),
            PlaceOutcome::Rejected(stock_issues) => {
                metrics::counter!("checkout_rejected_total").increment(1);
                return Err(CheckoutError::Rejected(map_stock_issues(
                    &request,
                    stock_issues,
                )));
            }
        };
        let (order, lines) = placed;

        // The delivery info supplied at checkout becomes the user's current
        // delivery fields, as part of the same attempt: failure here undoes
        // the placement.
        if let Err(e) = self.store.update_delivery(user_id, &request.delivery).await {
            self.store.rollback_order(&order.id).await?;
            return Err(e.into());
        }
        user.apply_delivery(&request.delivery);

        if request.payment_method.is_gateway() {
            let redirect = RedirectRequest {
                txn_ref: order.id.to_string(),
                amount: order.total_price,
                order_info: format!("Payment for order {}", order.id),
                client_ip: client_ip.to_string(),
            };
            let url = match tokio::time::timeout(
                self.gateway_timeout,
                self.gateway.build_redirect(redirect),
            )
            .await
            {
                Ok(Ok(url)) => url,
                Ok(Err(e)) => return self.abandon(&order.id, e).await,
                Err(_) => return self.abandon(&order.id, GatewayError::Timeout).await,
            };

            metrics::counter!("orders_created_total").increment(1);
            metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
            tracing::info!(order_id = %order_id, "order placed, awaiting gateway payment");
            return Ok(Checkout::Redirect {
                order_id,
                redirect_url: url,
            });
        }

        metrics::counter!("orders_created_total").increment(1);
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(order_id = %order.id, total = %order.total_price, "order placed");
        Ok(Checkout::Placed { order, lines, user })
    }

    /// Rolls a just-placed order back after a gateway failure and surfaces
    /// the gateway error.
    async fn abandon(
        &self,
        order_id: &OrderId,
        cause: GatewayError,
    ) -> Result<Checkout, CheckoutError> {
        tracing::warn!(order_id = %order_id, error = %cause, "gateway redirect failed, rolling back");
        self.store.rollback_order(order_id).await?;
        metrics::counter!("checkout_rejected_total").increment(1);
        Err(CheckoutError::Gateway(cause))
    }
}

/// Maps cell-level stock issues back to the request items they affect.
fn map_stock_issues(request: &OrderRequest, stock_issues: Vec<StockIssue>) -> Vec<ItemIssue> {
    let mut issues = Vec::new();
    for stock_issue in stock_issues {
        let cell = stock_issue.cell();
        for (index, item) in request.items.iter().enumerate() {
            if item.product_id != cell.product
                || item.color_id != cell.color
                || item.size_id != cell.size
            {
                continue;
            }
            let reason = match &stock_issue {
                StockIssue::Missing { cell } => IssueReason::NotFound {
                    what: format!("stock entry for {cell}"),
                },
                StockIssue::Insufficient {
                    requested,
                    available,
                    ..
                } => IssueReason::InsufficientStock {
                    requested: *requested,
                    available: *available,
                },
            };
            issues.push(ItemIssue {
                index,
                product_id: item.product_id.clone(),
                color_id: item.color_id.clone(),
                size_id: item.size_id.clone(),
                reason,
            });
        }
    }
    issues
}
