use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ApiError, AppState};
use crate::domain::aggregates::{
    Cart, Category, Comment, Conversation, CustomerAccount, Message, Order, OrderStatus, Product, User, UserProfile,
};
use crate::domain::service::NewProduct;
use crate::domain::value_objects::{
    AccountId, CartId, CategoryId, ConversationId, LineItemId, MessageId, ProductId, UserId,
};

type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub slug: Option<String>,
}

pub async fn list_categories(State(s): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(s.service.list_categories().await?))
}

pub async fn create_category(
    State(s): State<AppState>,
    Json(r): Json<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    r.validate()?;
    let category = s.service.create_category(&r.name, r.slug.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn delete_category(State(s): State<AppState>, Path(id): Path<CategoryId>) -> ApiResult<StatusCode> {
    s.service.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ProductFilter {
    pub category: Option<CategoryId>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriceRequest {
    pub price: Decimal,
}

pub async fn list_products(
    State(s): State<AppState>,
    Query(f): Query<ProductFilter>,
) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(s.service.list_products(f.category).await?))
}

pub async fn create_product(
    State(s): State<AppState>,
    Json(r): Json<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    r.validate()?;
    let product = s
        .service
        .create_product(NewProduct { name: r.name, description: r.description, price: r.price, category_id: r.category_id })
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<ProductId>) -> ApiResult<Json<Product>> {
    Ok(Json(s.service.product(id).await?))
}

pub async fn update_product_price(
    State(s): State<AppState>,
    Path(id): Path<ProductId>,
    Json(r): Json<UpdatePriceRequest>,
) -> ApiResult<Json<Product>> {
    Ok(Json(s.service.update_product_price(id, r.price).await?))
}

pub async fn delete_product(State(s): State<AppState>, Path(id): Path<ProductId>) -> ApiResult<StatusCode> {
    s.service.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Carts
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LineItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

pub async fn get_cart(State(s): State<AppState>, Path(id): Path<CartId>) -> ApiResult<Json<Cart>> {
    Ok(Json(s.service.cart(id).await?))
}

pub async fn add_line_item(
    State(s): State<AppState>,
    Path(id): Path<CartId>,
    Json(r): Json<LineItemRequest>,
) -> ApiResult<Json<Cart>> {
    Ok(Json(s.service.add_line_item(id, r.product_id, r.quantity).await?))
}

pub async fn update_line_item(
    State(s): State<AppState>,
    Path(id): Path<CartId>,
    Json(r): Json<LineItemRequest>,
) -> ApiResult<Json<Cart>> {
    Ok(Json(s.service.update_line_item(id, r.product_id, r.quantity).await?))
}

pub async fn empty_cart(State(s): State<AppState>, Path(id): Path<CartId>) -> ApiResult<Json<Cart>> {
    Ok(Json(s.service.empty_cart(id).await?))
}

pub async fn calculate_total(State(s): State<AppState>, Path(id): Path<CartId>) -> ApiResult<Json<Cart>> {
    Ok(Json(s.service.calculate_total_price(id).await?))
}

/// 201 with the order, or 204 when the cart had nothing to order.
pub async fn checkout(State(s): State<AppState>, Path(id): Path<CartId>) -> ApiResult<Response> {
    Ok(match s.service.make_order(id).await? {
        Some(order) => (StatusCode::CREATED, Json(order)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

pub async fn remove_line_item(State(s): State<AppState>, Path(id): Path<LineItemId>) -> ApiResult<Json<Cart>> {
    Ok(Json(s.service.remove_line_item(id).await?))
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    /// Two-letter code or snake_case name
    pub status: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

pub async fn get_order(State(s): State<AppState>, Path(slug): Path<String>) -> ApiResult<Json<Order>> {
    Ok(Json(s.service.order_by_slug(&slug).await?))
}

pub async fn set_order_status(
    State(s): State<AppState>,
    Path(slug): Path<String>,
    Json(r): Json<StatusRequest>,
) -> ApiResult<Json<Order>> {
    let status: OrderStatus = r.status.parse()?;
    let order = s.service.order_by_slug(&slug).await?;
    Ok(Json(s.service.set_order_status(order.id(), status).await?))
}

pub async fn list_comments(State(s): State<AppState>, Path(slug): Path<String>) -> ApiResult<Json<Vec<Comment>>> {
    let order = s.service.order_by_slug(&slug).await?;
    Ok(Json(s.service.comments(order.id()).await?))
}

pub async fn add_comment(
    State(s): State<AppState>,
    Path(slug): Path<String>,
    Json(r): Json<CommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    r.validate()?;
    let order = s.service.order_by_slug(&slug).await?;
    Ok((StatusCode::CREATED, Json(s.service.add_comment(order.id(), &r.content).await?)))
}

// =============================================================================
// Users and accounts
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
    pub company: Option<String>,
}

impl From<RegisterRequest> for UserProfile {
    fn from(r: RegisterRequest) -> Self {
        Self { email: r.email, first_name: r.first_name, last_name: r.last_name, company: r.company }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerRegistration {
    pub user: User,
    pub account: CustomerAccount,
}

pub async fn register_employee(
    State(s): State<AppState>,
    Json(r): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    r.validate()?;
    Ok((StatusCode::CREATED, Json(s.service.register_employee(r.into()).await?)))
}

pub async fn employee_by_reg_number(State(s): State<AppState>, Path(reg): Path<String>) -> ApiResult<Json<User>> {
    Ok(Json(s.service.user_by_reg_number(&reg).await?))
}

pub async fn register_customer(
    State(s): State<AppState>,
    Json(r): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<CustomerRegistration>)> {
    r.validate()?;
    let (user, account) = s.service.register_customer(r.into()).await?;
    Ok((StatusCode::CREATED, Json(CustomerRegistration { user, account })))
}

pub async fn get_user(State(s): State<AppState>, Path(id): Path<UserId>) -> ApiResult<Json<User>> {
    Ok(Json(s.service.user(id).await?))
}

pub async fn create_customer_account(
    State(s): State<AppState>,
    Path(id): Path<UserId>,
) -> ApiResult<(StatusCode, Json<CustomerAccount>)> {
    Ok((StatusCode::CREATED, Json(s.service.create_customer_account(id).await?)))
}

pub async fn user_orders(State(s): State<AppState>, Path(id): Path<UserId>) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(s.service.orders_for_user(id).await?))
}

pub async fn user_conversations(
    State(s): State<AppState>,
    Path(id): Path<UserId>,
) -> ApiResult<Json<Vec<Conversation>>> {
    Ok(Json(s.service.conversations_for(id).await?))
}

pub async fn get_account(State(s): State<AppState>, Path(id): Path<AccountId>) -> ApiResult<Json<CustomerAccount>> {
    Ok(Json(s.service.account(id).await?))
}

pub async fn create_cart(State(s): State<AppState>, Path(id): Path<AccountId>) -> ApiResult<Json<Cart>> {
    Ok(Json(s.service.create_cart(id).await?))
}

// =============================================================================
// Messaging
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub last: Option<usize>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PostMessageRequest {
    pub author_id: UserId,
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
}

pub async fn list_messages(
    State(s): State<AppState>,
    Path(id): Path<ConversationId>,
    Query(q): Query<MessagesQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    Ok(Json(s.service.messages(id, q.last).await?))
}

pub async fn post_message(
    State(s): State<AppState>,
    Path(id): Path<ConversationId>,
    Json(r): Json<PostMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    r.validate()?;
    Ok((StatusCode::CREATED, Json(s.service.post_message(id, r.author_id, &r.content).await?)))
}

pub async fn mark_message_read(State(s): State<AppState>, Path(id): Path<MessageId>) -> ApiResult<StatusCode> {
    s.service.mark_message_read(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
