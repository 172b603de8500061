//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use checkout::gateway::keys;
use checkout::sign_params;
use domain::{ColorId, OrderStatus, ProductId, SizeId, StockCell, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, OrderStore};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn setup_with_store() -> (axum::Router, InMemoryStore) {
    let store = InMemoryStore::new();
    api::seed_demo_catalog(&store).await;
    let config = api::config::Config::default();
    let state = api::create_state(store.clone(), &config);
    let app = api::create_app(state, get_metrics_handle());
    (app, store)
}

async fn setup() -> axum::Router {
    setup_with_store().await.0
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn order_body(items: serde_json::Value, payment_method: &str) -> serde_json::Value {
    serde_json::json!({
        "user_id": "U001",
        "items": items,
        "full_name": "An Nguyen",
        "phone": "0900000001",
        "address": "12 Ly Thuong Kiet",
        "payment_method": payment_method,
    })
}

fn signed_callback(txn_ref: &str, amount: i64, response_code: &str) -> serde_json::Value {
    let mut params = std::collections::BTreeMap::new();
    params.insert(keys::TXN_REF.to_string(), txn_ref.to_string());
    params.insert(keys::AMOUNT.to_string(), amount.to_string());
    params.insert(keys::RESPONSE_CODE.to_string(), response_code.to_string());
    params.insert(keys::BANK_CODE.to_string(), "NCB".to_string());
    params.insert(keys::TXN_NO.to_string(), "14668289".to_string());
    params.insert(keys::TXN_STATUS.to_string(), response_code.to_string());
    // The default dev-config secret.
    let signature = sign_params(&params, "insecure-dev-secret");
    params.insert(keys::SECURE_HASH.to_string(), signature);
    serde_json::to_value(params).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_cod_order() {
    let (app, store) = setup_with_store().await;

    let body = order_body(
        serde_json::json!([
            {"product_id": "P001", "color_id": "C01", "size_id": "M", "quantity": 2}
        ]),
        "cash_on_delivery",
    );
    let response = app.oneshot(post_json("/orders", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = json_body(response).await;
    assert_eq!(json["order"]["status"], "confirmed");
    assert_eq!(json["order"]["total_price_cents"], 5000);
    assert_eq!(json["lines"][0]["subtotal_cents"], 5000);
    assert_eq!(json["user"]["full_name"], "An Nguyen");

    let cell = StockCell::new(ProductId::new("P001"), ColorId::new("C01"), SizeId::new("M"));
    assert_eq!(store.stock_of(&cell).await, Some(8));
}

#[tokio::test]
async fn test_create_order_insufficient_stock() {
    let (app, store) = setup_with_store().await;

    let body = order_body(
        serde_json::json!([
            {"product_id": "P001", "color_id": "C01", "size_id": "M", "quantity": 99}
        ]),
        "cash_on_delivery",
    );
    let response = app.oneshot(post_json("/orders", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = json_body(response).await;
    assert_eq!(json["error"], "order rejected");
    assert_eq!(json["details"][0]["kind"], "insufficient_stock");
    assert_eq!(json["details"][0]["available"], 10);

    let cell = StockCell::new(ProductId::new("P001"), ColorId::new("C01"), SizeId::new("M"));
    assert_eq!(store.stock_of(&cell).await, Some(10));
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn test_create_order_missing_delivery_info() {
    let app = setup().await;

    let mut body = order_body(
        serde_json::json!([
            {"product_id": "P001", "color_id": "C01", "size_id": "M", "quantity": 1}
        ]),
        "cash_on_delivery",
    );
    body["phone"] = serde_json::Value::String(String::new());

    let response = app.oneshot(post_json("/orders", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_gateway_order_and_success_callback() {
    let (app, store) = setup_with_store().await;

    let body = order_body(
        serde_json::json!([
            {"product_id": "P001", "color_id": "C01", "size_id": "M", "quantity": 2}
        ]),
        "gateway",
    );
    let response = app
        .clone()
        .oneshot(post_json("/orders", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let redirect_url = json["redirect_url"].as_str().unwrap();
    assert!(redirect_url.contains("secure_hash="));

    // Recover the order ID from the pending order in the store.
    let orders = store.orders_for_user(&UserId::new("U001")).await.unwrap();
    assert_eq!(orders.len(), 1);
    let order_id = orders[0].id.clone();
    assert_eq!(orders[0].status, OrderStatus::Pending);

    let callback = signed_callback(order_id.as_str(), 5000 * 100, "00");
    let response = app
        .oneshot(post_json("/payment/callback", callback))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["result_code"], "00");

    let order = store.order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn test_callback_with_bad_signature() {
    let (app, store) = setup_with_store().await;

    let body = order_body(
        serde_json::json!([
            {"product_id": "P001", "color_id": "C01", "size_id": "M", "quantity": 1}
        ]),
        "gateway",
    );
    app.clone()
        .oneshot(post_json("/orders", body))
        .await
        .unwrap();
    let orders = store.orders_for_user(&UserId::new("U001")).await.unwrap();
    let order_id = orders[0].id.clone();

    let mut callback = signed_callback(order_id.as_str(), 2500 * 100, "00");
    callback["amount"] = serde_json::Value::String("1".to_string());

    let response = app
        .oneshot(post_json("/payment/callback", callback))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["result_code"], "97");

    // Untouched by the forged callback.
    let order = store.order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_callback_malformed_payloads() {
    let app = setup().await;

    // Not an object of scalars.
    let response = app
        .clone()
        .oneshot(post_json("/payment/callback", serde_json::json!([1, 2])))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["result_code"], "99");

    // Invalid JSON body.
    let request = Request::builder()
        .method("POST")
        .uri("/payment/callback")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(json_body(response).await["result_code"], "99");
}

#[tokio::test]
async fn test_list_and_get_orders() {
    let (app, _store) = setup_with_store().await;

    let body = order_body(
        serde_json::json!([
            {"product_id": "P002", "color_id": "C03", "size_id": "L", "quantity": 1}
        ]),
        "bank_transfer",
    );
    let response = app
        .clone()
        .oneshot(post_json("/orders", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    let order_id = created["order"]["order_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/orders?user_id=U001")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = json_body(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["order_id"], order_id.as_str());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{order_id}?user_id=U001"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let detail = json_body(response).await;
    assert_eq!(detail["order"]["order_id"], order_id.as_str());
    assert_eq!(detail["lines"].as_array().unwrap().len(), 1);

    // Another user cannot see the order.
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{order_id}?user_id=U999"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cart_flow() {
    let app = setup().await;

    // Add two shirts.
    let response = app
        .clone()
        .oneshot(post_json(
            "/cart/items",
            serde_json::json!({
                "user_id": "U001", "product_id": "P001",
                "color_id": "C01", "size_id": "M", "quantity": 2
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let cart = json_body(response).await;
    assert_eq!(cart["total_quantity"], 2);
    assert_eq!(cart["total_price_cents"], 5000);
    assert_eq!(cart["items"][0]["product_name"], "Linen Shirt");

    // Adding past available stock is refused.
    let response = app
        .clone()
        .oneshot(post_json(
            "/cart/items",
            serde_json::json!({
                "user_id": "U001", "product_id": "P001",
                "color_id": "C01", "size_id": "M", "quantity": 99
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Set the quantity, then remove the row.
    let response = app
        .clone()
        .oneshot({
            Request::builder()
                .method("PUT")
                .uri("/cart/items")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "user_id": "U001", "product_id": "P001",
                        "color_id": "C01", "size_id": "M", "quantity": 5
                    })
                    .to_string(),
                ))
                .unwrap()
        })
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cart = json_body(response).await;
    assert_eq!(cart["items"][0]["quantity"], 5);

    let response = app
        .clone()
        .oneshot({
            Request::builder()
                .method("DELETE")
                .uri("/cart/items")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "user_id": "U001", "product_id": "P001",
                        "color_id": "C01", "size_id": "M"
                    })
                    .to_string(),
                ))
                .unwrap()
        })
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cart = json_body(response).await;
    assert_eq!(cart["total_quantity"], 0);

    // Unknown stock cell answers 404.
    let response = app
        .oneshot(post_json(
            "/cart/items",
            serde_json::json!({
                "user_id": "U001", "product_id": "P001",
                "color_id": "C03", "size_id": "M", "quantity": 1
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
