//! HTTP API server for the storefront backend.
//!
//! REST endpoints for cart management, order creation, order listing, and
//! the payment gateway callback, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::{HostedGateway, OrderBuilder, PaymentReconciler};
use domain::{Color, ColorId, Money, Product, ProductId, Size, SizeId, StockCell, User, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, Store};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/payment/callback", post(routes::payment::callback::<S>))
        .route("/cart", get(routes::cart::view::<S>))
        .route(
            "/cart/items",
            post(routes::cart::add::<S>)
                .put(routes::cart::update::<S>)
                .delete(routes::cart::remove::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state: order builder and payment reconciler
/// wired to the given store and the configured gateway.
pub fn create_state<S: Store + Clone + 'static>(store: S, config: &Config) -> Arc<AppState<S>> {
    let gateway = HostedGateway::new(config.gateway_config());
    let builder = OrderBuilder::new(store.clone(), gateway, config.gateway_timeout());
    let reconciler = PaymentReconciler::new(store.clone(), config.gateway_secret.clone());

    Arc::new(AppState {
        store,
        builder,
        reconciler,
    })
}

/// Seeds a small demo catalog into the in-memory store, for development
/// runs without a database.
pub async fn seed_demo_catalog(store: &InMemoryStore) {
    for (id, name) in [("C01", "Red"), ("C02", "Blue"), ("C03", "Black")] {
        store
            .insert_color(Color {
                id: ColorId::new(id),
                name: name.to_string(),
            })
            .await;
    }
    for (id, name) in [("S", "Small"), ("M", "Medium"), ("L", "Large")] {
        store
            .insert_size(Size {
                id: SizeId::new(id),
                name: name.to_string(),
            })
            .await;
    }

    store
        .insert_product(Product {
            id: ProductId::new("P001"),
            name: "Linen Shirt".to_string(),
            sell_price: Money::from_cents(2500),
            colors: vec![ColorId::new("C01"), ColorId::new("C02")],
            sizes: vec![SizeId::new("S"), SizeId::new("M"), SizeId::new("L")],
        })
        .await;
    store
        .insert_product(Product {
            id: ProductId::new("P002"),
            name: "Denim Jacket".to_string(),
            sell_price: Money::from_cents(7900),
            colors: vec![ColorId::new("C02"), ColorId::new("C03")],
            sizes: vec![SizeId::new("M"), SizeId::new("L")],
        })
        .await;

    for color in ["C01", "C02"] {
        for size in ["S", "M", "L"] {
            store
                .set_stock(
                    StockCell::new(ProductId::new("P001"), ColorId::new(color), SizeId::new(size)),
                    10,
                )
                .await;
        }
    }
    for color in ["C02", "C03"] {
        for size in ["M", "L"] {
            store
                .set_stock(
                    StockCell::new(ProductId::new("P002"), ColorId::new(color), SizeId::new(size)),
                    5,
                )
                .await;
        }
    }

    store
        .insert_user(User {
            id: UserId::new("U001"),
            email: "demo@example.com".to_string(),
            full_name: "Demo User".to_string(),
            phone: "0900000000".to_string(),
            address: "1 Demo Street".to_string(),
        })
        .await;
}
