//! Cart endpoints: view, add, update, remove.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{ColorId, ProductId, SizeId, StockCell, UserId};
use serde::{Deserialize, Serialize};
use store::{CartAddOutcome, Store};

use crate::error::ApiError;
use crate::routes::orders::AppState;

#[derive(Debug, Deserialize)]
pub struct CartQuery {
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct CartItemRequest {
    pub user_id: String,
    pub product_id: String,
    pub color_id: String,
    pub size_id: String,
    /// Quantity to add (POST) or to set (PUT); ignored on DELETE.
    pub quantity: Option<u32>,
}

#[derive(Serialize)]
pub struct CartItemView {
    pub product_id: String,
    pub color_id: String,
    pub size_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

#[derive(Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub total_quantity: u32,
    pub total_price_cents: i64,
}

impl CartItemRequest {
    fn cell(&self) -> StockCell {
        StockCell::new(
            ProductId::new(self.product_id.as_str()),
            ColorId::new(self.color_id.as_str()),
            SizeId::new(self.size_id.as_str()),
        )
    }

    fn user(&self) -> UserId {
        UserId::new(self.user_id.as_str())
    }
}

/// GET /cart?user_id=… — the user's cart with per-line and total pricing.
#[tracing::instrument(skip(state))]
pub async fn view<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<CartQuery>,
) -> Result<Json<CartView>, ApiError> {
    let user = UserId::new(query.user_id.as_str());
    Ok(Json(cart_view(&state.store, &user).await?))
}

/// POST /cart/items — add quantity of a (product, color, size) to the cart.
#[tracing::instrument(skip(state, req))]
pub async fn add<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CartItemRequest>,
) -> Result<Response, ApiError> {
    let quantity = req.quantity.unwrap_or(1);
    if quantity == 0 {
        return Err(ApiError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let outcome = state
        .store
        .add_item(&req.user(), &req.cell(), quantity)
        .await?;

    match outcome {
        CartAddOutcome::Added(_) => {
            let cart = cart_view(&state.store, &req.user()).await?;
            Ok((StatusCode::CREATED, Json(cart)).into_response())
        }
        CartAddOutcome::Shortfall { available, in_cart } => Err(ApiError::BadRequest(format!(
            "Cannot add {quantity} items to the cart. Only {} items are available in stock.",
            available.saturating_sub(in_cart)
        ))),
    }
}

/// PUT /cart/items — set the quantity of a cart row.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CartItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    let quantity = req.quantity.unwrap_or(1);
    if quantity == 0 {
        return Err(ApiError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let found = state
        .store
        .set_item(&req.user(), &req.cell(), quantity)
        .await?;
    if !found {
        return Err(ApiError::NotFound("product not found in cart".to_string()));
    }

    Ok(Json(cart_view(&state.store, &req.user()).await?))
}

/// DELETE /cart/items — remove a cart row.
#[tracing::instrument(skip(state, req))]
pub async fn remove<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CartItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    let found = state.store.remove_item(&req.user(), &req.cell()).await?;
    if !found {
        return Err(ApiError::NotFound("product not found in cart".to_string()));
    }

    Ok(Json(cart_view(&state.store, &req.user()).await?))
}

async fn cart_view<S: Store>(store: &S, user: &UserId) -> Result<CartView, ApiError> {
    let items = store.cart_items(user).await?;

    let mut views = Vec::with_capacity(items.len());
    let mut total_quantity = 0u32;
    let mut total_price_cents = 0i64;
    for item in items {
        let product = store.product(&item.cell.product).await?;
        let (name, unit_price) = match product {
            Some(product) => (product.name, product.sell_price.cents()),
            // Product removed from the catalog after it entered the cart.
            None => (String::new(), 0),
        };
        let subtotal = unit_price * i64::from(item.quantity);
        total_quantity += item.quantity;
        total_price_cents += subtotal;
        views.push(CartItemView {
            product_id: item.cell.product.to_string(),
            color_id: item.cell.color.to_string(),
            size_id: item.cell.size.to_string(),
            product_name: name,
            quantity: item.quantity,
            unit_price_cents: unit_price,
            subtotal_cents: subtotal,
        });
    }

    Ok(CartView {
        items: views,
        total_quantity,
        total_price_cents,
    })
}
