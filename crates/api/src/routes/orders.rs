//! Order endpoints: creation, listing, detail.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use checkout::{Checkout, HostedGateway, OrderBuilder, PaymentReconciler};
use common::OrderId;
use domain::{
    ColorId, DeliveryInfo, ItemRequest, Order, OrderLine, OrderRequest, PaymentMethod, ProductId,
    SizeId, User, UserId,
};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub store: S,
    pub builder: OrderBuilder<S, HostedGateway>,
    pub reconciler: PaymentReconciler<S>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub items: Vec<OrderItemRequest>,
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub payment_method: Option<String>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub color_id: String,
    pub size_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub status: String,
    pub total_price_cents: i64,
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_txn: Option<GatewayTxnResponse>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct GatewayTxnResponse {
    pub bank_code: String,
    pub txn_no: String,
    pub response_code: String,
    pub txn_status: String,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub line_id: String,
    pub product_id: String,
    pub color_id: String,
    pub size_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub user_id: String,
    pub full_name: String,
    pub phone: String,
    pub address: String,
}

#[derive(Serialize)]
pub struct CreateOrderResponse {
    pub order: OrderResponse,
    pub lines: Vec<OrderLineResponse>,
    pub user: UserResponse,
}

#[derive(Serialize)]
pub struct RedirectResponse {
    pub redirect_url: String,
}

#[derive(Serialize)]
pub struct OrderDetailResponse {
    pub order: OrderResponse,
    pub lines: Vec<OrderLineResponse>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        OrderResponse {
            order_id: order.id.to_string(),
            status: order.status.to_string(),
            total_price_cents: order.total_price.cents(),
            payment_method: order.payment_method.to_string(),
            gateway_txn: order.gateway_txn.as_ref().map(|txn| GatewayTxnResponse {
                bank_code: txn.bank_code.clone(),
                txn_no: txn.txn_no.clone(),
                response_code: txn.response_code.clone(),
                txn_status: txn.txn_status.clone(),
            }),
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
        }
    }
}

impl From<&OrderLine> for OrderLineResponse {
    fn from(line: &OrderLine) -> Self {
        OrderLineResponse {
            line_id: line.id.to_string(),
            product_id: line.product.to_string(),
            color_id: line.color.to_string(),
            size_id: line.size.to_string(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            subtotal_cents: line.subtotal().cents(),
        }
    }
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            user_id: user.id.to_string(),
            full_name: user.full_name.clone(),
            phone: user.phone.clone(),
            address: user.address.clone(),
        }
    }
}

// -- Handlers --

/// POST /orders — create an order from the selected items.
///
/// Answers `201` with the placed order, `200` with a gateway redirect URL,
/// or `400` with the aggregated per-item error list.
#[tracing::instrument(skip(state, headers, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Response, ApiError> {
    let payment_method = match &req.payment_method {
        None => PaymentMethod::CashOnDelivery,
        Some(raw) => PaymentMethod::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown payment method: {raw}")))?,
    };

    let request = OrderRequest {
        items: req
            .items
            .iter()
            .map(|item| ItemRequest {
                product_id: ProductId::new(item.product_id.as_str()),
                color_id: ColorId::new(item.color_id.as_str()),
                size_id: SizeId::new(item.size_id.as_str()),
                quantity: item.quantity,
            })
            .collect(),
        delivery: DeliveryInfo {
            full_name: req.full_name.clone(),
            phone: req.phone.clone(),
            address: req.address.clone(),
        },
        payment_method,
    };

    let user_id = UserId::new(req.user_id.as_str());
    let outcome = state
        .builder
        .create_order(&user_id, request, &client_ip(&headers))
        .await?;

    Ok(match outcome {
        Checkout::Placed { order, lines, user } => (
            StatusCode::CREATED,
            Json(CreateOrderResponse {
                order: OrderResponse::from(&order),
                lines: lines.iter().map(OrderLineResponse::from).collect(),
                user: UserResponse::from(&user),
            }),
        )
            .into_response(),
        Checkout::Redirect { redirect_url, .. } => {
            (StatusCode::OK, Json(RedirectResponse { redirect_url })).into_response()
        }
    })
}

/// GET /orders?user_id=… — list the user's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state
        .store
        .orders_for_user(&UserId::new(query.user_id.as_str()))
        .await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id}?user_id=… — one order with its lines.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<OrderDetailResponse>, ApiError> {
    let order_id = OrderId::from_raw(id.as_str());
    let order = state
        .store
        .order_for_user(&UserId::new(query.user_id.as_str()), &order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order {id} not found")))?;
    let lines = state.store.lines(&order_id).await?;

    Ok(Json(OrderDetailResponse {
        order: OrderResponse::from(&order),
        lines: lines.iter().map(OrderLineResponse::from).collect(),
    }))
}

/// Client IP as reported by the proxy, for the gateway's fraud checks.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}
