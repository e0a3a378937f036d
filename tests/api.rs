//! HTTP routes driven through the router without a listener.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use ventashop::api::{router, AppState};
use ventashop::domain::{NoOpEventPublisher, ShopService};
use ventashop::infra::InMemoryRepository;

fn app() -> Router {
    let service = ShopService::new(Arc::new(InMemoryRepository::new()), Arc::new(NoOpEventPublisher));
    router(AppState { service: Arc::new(service) })
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri).header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (status, body) = call(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_checkout_over_http() {
    let app = app();
    let (status, _) = call(&app, "POST", "/api/v1/employees", Some(json!({"email": "sales@ventalis.test"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, registration) =
        call(&app, "POST", "/api/v1/customers", Some(json!({"email": "buyer@example.com", "first_name": "Ann"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let cart_id = registration["account"]["cart_id"].as_str().unwrap().to_string();

    let (status, product) =
        call(&app, "POST", "/api/v1/products", Some(json!({"name": "Bolts", "price": "0.10"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let product_id = product["id"].as_str().unwrap().to_string();

    let (status, cart) = call(
        &app,
        "POST",
        &format!("/api/v1/carts/{cart_id}/items"),
        Some(json!({"product_id": product_id, "quantity": 1500})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);

    let (status, order) = call(&app, "POST", &format!("/api/v1/carts/{cart_id}/checkout"), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let slug = order["slug"].as_str().unwrap().to_string();

    let (status, _) =
        call(&app, "PUT", &format!("/api/v1/orders/{slug}/status"), Some(json!({"status": "EX"}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, order) = call(&app, "GET", &format!("/api/v1/orders/{slug}"), None).await;
    assert_eq!(order["status"], "shipped");

    let (status, comments) = call(&app, "GET", &format!("/api/v1/orders/{slug}/comments"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(comments.as_array().unwrap().len(), 1);

    let (status, _) = call(&app, "POST", &format!("/api/v1/carts/{cart_id}/checkout"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_error_statuses() {
    let app = app();
    let (status, body) =
        call(&app, "POST", "/api/v1/customers", Some(json!({"email": "buyer@example.com"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());

    let (status, _) = call(&app, "POST", "/api/v1/employees", Some(json!({"email": "not-an-email"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let missing = uuid::Uuid::now_v7();
    let (status, _) = call(&app, "GET", &format!("/api/v1/carts/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "GET", "/api/v1/orders/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "POST", "/api/v1/products", Some(json!({"name": "Bad", "price": "-1"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let huge = json!({"name": "Huge", "price": "100000000000000000000"});
    let (status, _) = call(&app, "POST", "/api/v1/products", Some(huge)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
