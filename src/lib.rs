//! Ventashop storefront core
//!
//! Order management for a wholesale storefront.
//!
//! ## Features
//! - Product catalog with categories
//! - Shopping carts with a minimum order quantity per line
//! - Checkout of a cart into an immutable order, with VAT and a comment trail
//! - Customer accounts balanced across sales employees
//! - Customer/employee conversations

pub mod api;
pub mod config;
pub mod domain;
pub mod infra;

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum ShopError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("Category not found")]
    CategoryNotFound,

    #[error("Cart not found")]
    CartNotFound,

    #[error("Line item not found")]
    LineItemNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Customer account not found")]
    AccountNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("No employee available to take the customer account")]
    NoEligibleEmployee,

    #[error("Product is still referenced by line items")]
    ProductInUse,

    #[error("Name already taken: {0}")]
    DuplicateName(String),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Customer already has an account")]
    AccountExists,

    #[error("Generated code already in use: {0}")]
    CodeCollision(String),

    #[error("No unique code found after {0} attempts")]
    CodeSpaceExhausted(usize),

    #[error("Concurrent modification, try again")]
    Conflict,

    #[error("Invalid price")]
    InvalidPrice,

    #[error("Invalid order status: {0}")]
    InvalidStatus(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl ShopError {
    /// Whether the error reports a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ProductNotFound
                | Self::CategoryNotFound
                | Self::CartNotFound
                | Self::LineItemNotFound
                | Self::OrderNotFound
                | Self::AccountNotFound
                | Self::UserNotFound
                | Self::ConversationNotFound
                | Self::MessageNotFound
        )
    }
}

pub type Result<T> = std::result::Result<T, ShopError>;
