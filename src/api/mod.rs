//! HTTP API
//!
//! Thin axum layer over `ShopService`: handlers decode the request, call one
//! service operation and encode its result.

mod error;
mod handlers;

pub use error::ApiError;

use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::domain::ShopService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ShopService>,
}

pub fn router(state: AppState) -> Router {
    use handlers::*;

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "ventashop"})) }))
        .route("/api/v1/categories", get(list_categories).post(create_category))
        .route("/api/v1/categories/:id", delete(delete_category))
        .route("/api/v1/products", get(list_products).post(create_product))
        .route("/api/v1/products/:id", get(get_product).delete(delete_product))
        .route("/api/v1/products/:id/price", put(update_product_price))
        .route("/api/v1/carts/:id", get(get_cart))
        .route("/api/v1/carts/:id/items", post(add_line_item).put(update_line_item).delete(empty_cart))
        .route("/api/v1/carts/:id/total", post(calculate_total))
        .route("/api/v1/carts/:id/checkout", post(checkout))
        .route("/api/v1/line-items/:id", delete(remove_line_item))
        .route("/api/v1/orders/:slug", get(get_order))
        .route("/api/v1/orders/:slug/status", put(set_order_status))
        .route("/api/v1/orders/:slug/comments", get(list_comments).post(add_comment))
        .route("/api/v1/employees", post(register_employee))
        .route("/api/v1/employees/:reg", get(employee_by_reg_number))
        .route("/api/v1/customers", post(register_customer))
        .route("/api/v1/users/:id", get(get_user))
        .route("/api/v1/users/:id/account", post(create_customer_account))
        .route("/api/v1/users/:id/orders", get(user_orders))
        .route("/api/v1/users/:id/conversations", get(user_conversations))
        .route("/api/v1/accounts/:id", get(get_account))
        .route("/api/v1/accounts/:id/cart", post(create_cart))
        .route("/api/v1/conversations/:id/messages", get(list_messages).post(post_message))
        .route("/api/v1/messages/:id/read", put(mark_message_read))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
