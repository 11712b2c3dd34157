//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::{InMemoryCatalog, Money, ProductSnapshot};
use event_store::InMemoryEventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::CheckoutConfig;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn catalog() -> InMemoryCatalog {
    let catalog = InMemoryCatalog::new();
    catalog
        .set_product(ProductSnapshot::new("p1", "Mug", Money::from_cents(1000), 5))
        .await;
    catalog
        .set_product(ProductSnapshot::new("p2", "Poster", Money::from_cents(2500), 2))
        .await;
    catalog
}

async fn setup() -> Router {
    let state = api::create_state(
        InMemoryEventStore::new(),
        api::Collaborators::in_memory(catalog().await),
        CheckoutConfig::default(),
    );
    api::create_app(state, get_metrics_handle())
}

fn user() -> String {
    uuid::Uuid::new_v4().to_string()
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn place_order(app: &Router, user: &str, unit_price: i64) -> Value {
    let (status, order) = send(
        app,
        "POST",
        "/orders",
        Some(user),
        Some(json!({
            "items": [{"productId": "p1", "name": "Mug", "quantity": 1, "unitPrice": unit_price}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    order
}

#[tokio::test]
async fn test_health_check() {
    let app = setup().await;
    let (status, json) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["readModels"], 2);
}

#[tokio::test]
async fn test_cart_requires_caller() {
    let app = setup().await;

    let (status, json) = send(&app, "GET", "/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].is_string());

    let (status, _) = send(&app, "GET", "/cart", Some("not-a-uuid"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_checkout_creates_order_and_empties_cart() {
    let app = setup().await;
    let user = user();

    let (status, cart) = send(
        &app,
        "POST",
        "/cart/items",
        Some(&user),
        Some(json!({"productId": "p1", "quantity": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{cart}");
    assert_eq!(cart["items"][0]["quantity"], 3);
    assert_eq!(cart["items"][0]["selected"], true);
    assert_eq!(cart["totalAmount"], 3000);

    let (status, receipt) = send(&app, "POST", "/cart/checkout", Some(&user), None).await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(receipt["totalAmount"], 3000);
    assert_eq!(receipt["status"], "pending");

    let order_id = receipt["orderId"].as_str().unwrap().to_string();
    let (status, order) = send(&app, "GET", &format!("/orders/{order_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["userId"], user.as_str());
    assert_eq!(order["items"][0]["unitPrice"], 1000);

    let (_, cart) = send(&app, "GET", "/cart", Some(&user), None).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);

    let saga_id = saga::checkout_id(order_id.parse().unwrap());
    let (status, record) = send(&app, "GET", &format!("/checkouts/{saga_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["state"], "AwaitingPayment");
    assert!(record["paymentDeadline"].is_string());
}

#[tokio::test]
async fn test_checkout_with_nothing_selected_is_rejected() {
    let app = setup().await;
    let user = user();

    let (status, json) = send(&app, "POST", "/cart/checkout", Some(&user), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_quantity_above_stock_is_rejected() {
    let app = setup().await;
    let user = user();

    let (status, json) = send(
        &app,
        "POST",
        "/cart/items",
        Some(&user),
        Some(json!({"productId": "p2", "quantity": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (status, _) = send(
        &app,
        "POST",
        "/cart/items",
        Some(&user),
        Some(json!({"productId": "nope", "quantity": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_select_and_remove_items() {
    let app = setup().await;
    let user = user();

    for (product, quantity) in [("p1", 1), ("p2", 1)] {
        let (status, _) = send(
            &app,
            "POST",
            "/cart/items",
            Some(&user),
            Some(json!({"productId": product, "quantity": quantity})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, cart) = send(
        &app,
        "POST",
        "/cart/select",
        Some(&user),
        Some(json!({"productIds": ["p2"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["totalSelected"], 1);
    assert_eq!(cart["totalAmount"], 2500);

    let (status, cart) = send(&app, "DELETE", "/cart/items/p2", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "DELETE", "/cart", Some(&user), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = setup().await;
    let user = user();

    let request = Request::builder()
        .method("POST")
        .uri("/cart/items")
        .header("x-user-id", &user)
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_lifecycle() {
    let app = setup().await;
    let user = user();
    let order = place_order(&app, &user, 1000).await;
    let id = order["id"].as_str().unwrap();
    assert_eq!(order["status"], "pending");
    assert_eq!(order["totalAmount"], 1000);

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/orders/{id}"),
        None,
        Some(json!({"status": "lost"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (status, cancelled) = send(
        &app,
        "POST",
        &format!("/orders/{id}/cancel"),
        None,
        Some(json!({"reason": "changed my mind"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["cancelReason"], "changed my mind");

    let (status, _) = send(&app, "POST", &format!("/orders/{id}/cancel"), None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_status_update_and_listing() {
    let app = setup().await;
    let user = user();
    let order = place_order(&app, &user, 1000).await;
    let id = order["id"].as_str().unwrap();
    place_order(&app, &user, 2000).await;

    let (status, paid) = send(
        &app,
        "PUT",
        &format!("/orders/{id}"),
        None,
        Some(json!({"status": "paid"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "paid");

    let (status, page) = send(&app, "GET", "/orders", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);

    let (status, page) = send(&app, "GET", "/orders?status=paid", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["orders"][0]["id"], id);

    let (status, _) = send(&app, "GET", "/orders?status=lost", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_errors() {
    let app = setup().await;
    let user = user();

    let (status, _) = send(
        &app,
        "POST",
        "/orders",
        None,
        Some(json!({"items": [{"productId": "p1", "quantity": 1, "unitPrice": 100}]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/orders",
        Some(&user),
        Some(json!({"items": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        Some(&user),
        Some(json!({
            "items": [{"productId": "p1", "quantity": 2, "unitPrice": i64::MAX / 2 + 1}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("total"));

    let order_id = uuid::Uuid::new_v4().to_string();
    let body = json!({
        "orderId": order_id,
        "items": [{"productId": "p1", "quantity": 1, "unitPrice": 100}]
    });
    let (status, _) = send(&app, "POST", "/orders", Some(&user), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, json) = send(&app, "POST", "/orders", Some(&user), Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].is_string());

    let missing = uuid::Uuid::new_v4();
    let (status, _) = send(&app, "GET", &format!("/orders/{missing}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/orders/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_process_and_refunds() {
    let app = setup().await;
    let user = user();
    let order = place_order(&app, &user, 15000).await;
    let order_id = order["id"].as_str().unwrap();

    let (status, payment) = send(
        &app,
        "POST",
        "/payments",
        Some(&user),
        Some(json!({
            "orderId": order_id,
            "amount": 15000,
            "currency": "USD",
            "method": "credit_card"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{payment}");
    assert_eq!(payment["status"], "pending");
    let payment_id = payment["id"].as_str().unwrap();

    let (status, processed) = send(
        &app,
        "POST",
        &format!("/payments/{payment_id}/process"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(processed["status"], "success");
    assert!(processed["transactionId"].is_string());

    let refund = |amount: i64| {
        json!({"paymentId": payment_id, "amount": amount, "reason": "damaged"})
    };
    let (status, refunded) = send(&app, "POST", "/payments/refund", None, Some(refund(10000))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refunded["refundedAmount"], 10000);
    assert_eq!(refunded["refunds"].as_array().unwrap().len(), 1);

    let (status, json) = send(&app, "POST", "/payments/refund", None, Some(refund(6000))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (status, by_order) = send(
        &app,
        "GET",
        &format!("/payments/order/{order_id}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_order["id"], payment_id);
    assert_eq!(by_order["refundedAmount"], 10000);

    let (status, page) = send(&app, "GET", "/payments", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn test_payment_cancel_and_lookups() {
    let app = setup().await;
    let user = user();
    let order = place_order(&app, &user, 500).await;
    let order_id = order["id"].as_str().unwrap();

    let (_, payment) = send(
        &app,
        "POST",
        "/payments",
        Some(&user),
        Some(json!({
            "orderId": order_id,
            "amount": 500,
            "currency": "USD",
            "method": "digital_wallet"
        })),
    )
    .await;
    let payment_id = payment["id"].as_str().unwrap();

    let (status, cancelled) = send(
        &app,
        "POST",
        &format!("/payments/{payment_id}/cancel"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/payments/{payment_id}/process"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = uuid::Uuid::new_v4();
    let (status, _) = send(&app, "GET", &format!("/payments/{missing}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", &format!("/payments/order/{missing}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_payment_links_checkout() {
    let app = setup().await;
    let user = user();

    send(
        &app,
        "POST",
        "/cart/items",
        Some(&user),
        Some(json!({"productId": "p1", "quantity": 1})),
    )
    .await;
    let (_, receipt) = send(&app, "POST", "/cart/checkout", Some(&user), None).await;
    let order_id = receipt["orderId"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "POST",
        "/payments",
        Some(&user),
        Some(json!({
            "orderId": order_id,
            "amount": 1000,
            "currency": "USD",
            "method": "credit_card"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let saga_id = saga::checkout_id(order_id.parse().unwrap());
    let (_, record) = send(&app, "GET", &format!("/checkouts/{saga_id}"), None, None).await;
    assert_eq!(record["state"], "Completed");
    assert!(record["paymentId"].is_string());
}

#[tokio::test]
async fn test_unknown_checkout_is_not_found() {
    let app = setup().await;
    let missing = uuid::Uuid::new_v4();
    let (status, _) = send(&app, "GET", &format!("/checkouts/{missing}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup().await;
    send(&app, "GET", "/cart", None, None).await;

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

#[tokio::test]
async fn test_state_is_shared_across_requests() {
    let state = api::create_state(
        InMemoryEventStore::new(),
        api::Collaborators::in_memory(catalog().await),
        CheckoutConfig::default(),
    );
    let app = api::create_app(Arc::clone(&state), get_metrics_handle());
    let user = user();
    place_order(&app, &user, 700).await;

    state.catch_up().await.unwrap();
    let page = state
        .order_summaries
        .all(projections::PageRequest::new(None, None))
        .await;
    assert_eq!(page.total, 1);
}

async fn raw_get(app: &Router, uri: &str) -> (StatusCode, axum::body::Bytes) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes)
}

#[tokio::test]
async fn test_repeated_reads_are_byte_identical() {
    let app = setup().await;
    let user = user();
    let order = place_order(&app, &user, 15000).await;
    let order_id = order["id"].as_str().unwrap();

    let (_, payment) = send(
        &app,
        "POST",
        "/payments",
        Some(&user),
        Some(json!({
            "orderId": order_id,
            "amount": 15000,
            "currency": "USD",
            "method": "credit_card"
        })),
    )
    .await;
    let payment_id = payment["id"].as_str().unwrap();
    send(&app, "POST", &format!("/payments/{payment_id}/process"), None, None).await;
    let (status, _) = send(
        &app,
        "POST",
        "/payments/refund",
        None,
        Some(json!({"paymentId": payment_id, "amount": 2500, "reason": "scratched"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for uri in [
        format!("/orders/{order_id}"),
        format!("/payments/{payment_id}"),
        format!("/payments/order/{order_id}"),
    ] {
        let (first_status, first) = raw_get(&app, &uri).await;
        let (second_status, second) = raw_get(&app, &uri).await;
        assert_eq!(first_status, StatusCode::OK, "{uri}");
        assert_eq!(second_status, StatusCode::OK, "{uri}");
        assert_eq!(first, second, "{uri}");
    }
}
