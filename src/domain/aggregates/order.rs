//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::aggregates::{Cart, LineItem, Owner, Product};
use crate::domain::pricing::{to_cents, total, vat};
use crate::domain::value_objects::{AccountId, CommentId, OrderId, ProductId, RefNumber, Slug};
use crate::{Result, ShopError};

/// Text of the comment every order starts with.
pub const ORDER_CREATED_COMMENT: &str = "Order has just been created.";

/// Longest accepted comment.
pub const COMMENT_MAX_LEN: usize = 2000;

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    id: OrderId,
    ref_number: RefNumber,
    slug: Slug,
    status: OrderStatus,
    account_id: Option<AccountId>,
    items: Vec<LineItem>,
    total_price: Decimal,
    vat_amount: Decimal,
    incl_vat_price: Decimal,
    created_at: DateTime<Utc>,
}

/// Order statuses. Administrators set them directly; there is no transition rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    NotProcessed,
    Processing,
    AwaitingSupply,
    PreparingShipment,
    AwaitingPayment,
    Shipped,
    Archived,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        Self::NotProcessed, Self::Processing, Self::AwaitingSupply, Self::PreparingShipment,
        Self::AwaitingPayment, Self::Shipped, Self::Archived, Self::Cancelled,
    ];

    /// Two-letter storage code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotProcessed => "NT",
            Self::Processing => "CT",
            Self::AwaitingSupply => "AA",
            Self::PreparingShipment => "PE",
            Self::AwaitingPayment => "AP",
            Self::Shipped => "EX",
            Self::Archived => "TA",
            Self::Cancelled => "AN",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NotProcessed => "Not processed",
            Self::Processing => "Processing",
            Self::AwaitingSupply => "Awaiting supply",
            Self::PreparingShipment => "Preparing shipment",
            Self::AwaitingPayment => "Awaiting payment",
            Self::Shipped => "Shipped",
            Self::Archived => "Processed",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn from_code(code: &str) -> Result<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code).ok_or_else(|| ShopError::InvalidStatus(code.to_string()))
    }
}

impl FromStr for OrderStatus {
    type Err = ShopError;

    /// Accepts the storage code or the snake_case name.
    fn from_str(s: &str) -> Result<Self> {
        Self::from_code(s).or_else(|_| {
            serde_json::from_value(serde_json::Value::String(s.to_string()))
                .map_err(|_| ShopError::InvalidStatus(s.to_string()))
        })
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub order_id: OrderId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(order_id: OrderId, content: impl Into<String>) -> Result<Self> {
        let content = content.into();
        let trimmed = content.trim();
        if trimmed.is_empty() { return Err(ShopError::Validation("comment is empty".into())); }
        if trimmed.chars().count() > COMMENT_MAX_LEN {
            return Err(ShopError::Validation(format!("comment longer than {COMMENT_MAX_LEN} characters")));
        }
        Ok(Self { id: CommentId::new(), order_id, content: trimmed.to_string(), created_at: Utc::now() })
    }
}

impl Order {
    /// Turns the content of `cart` into a new order.
    ///
    /// Every line is re-parented to the order and re-derived against the current
    /// product price; the cart is left empty at zero. Returns the order together
    /// with its initial comment. `products` must hold every product in the cart,
    /// and on error the cart is left untouched.
    pub fn place(
        cart: &mut Cart,
        ref_number: RefNumber,
        products: &HashMap<ProductId, Product>,
    ) -> Result<(Self, Comment)> {
        if cart.is_empty() { return Err(ShopError::Validation("cart has no line items".into())); }
        let id = OrderId::new();
        let slug = ref_number.slug()?;

        let mut items = cart.items().to_vec();
        for item in &mut items {
            let product = products.get(&item.product_id).ok_or(ShopError::ProductNotFound)?;
            item.prepare(product)?;
            item.owner = Owner::Order(id);
        }

        let mut order = Self {
            id, ref_number, slug, status: OrderStatus::default(), account_id: cart.account_id(),
            items, total_price: Decimal::ZERO, vat_amount: Decimal::ZERO,
            incl_vat_price: Decimal::ZERO, created_at: Utc::now(),
        };
        order.calculate_total_price()?;
        let comment = Comment::new(id, ORDER_CREATED_COMMENT)?;
        cart.take_items();
        Ok((order, comment))
    }

    /// Rebuilds an order read back from storage.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: OrderId,
        ref_number: RefNumber,
        slug: Slug,
        status: OrderStatus,
        account_id: Option<AccountId>,
        items: Vec<LineItem>,
        total_price: Decimal,
        vat_amount: Decimal,
        incl_vat_price: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self { id, ref_number, slug, status, account_id, items, total_price, vat_amount, incl_vat_price, created_at }
    }

    pub fn id(&self) -> OrderId { self.id }
    pub fn ref_number(&self) -> &RefNumber { &self.ref_number }
    pub fn slug(&self) -> &Slug { &self.slug }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn account_id(&self) -> Option<AccountId> { self.account_id }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn total_price(&self) -> Decimal { self.total_price }
    pub fn vat_amount(&self) -> Decimal { self.vat_amount }
    pub fn incl_vat_price(&self) -> Decimal { self.incl_vat_price }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn set_status(&mut self, status: OrderStatus) { self.status = status; }

    /// Sums the lines and derives the VAT fields, rounded to cents.
    pub fn calculate_total_price(&mut self) -> Result<Decimal> {
        self.total_price = total(self.items.iter().map(|i| i.price))?;
        let (vat_amount, incl_vat_price) = vat(self.total_price)?;
        self.vat_amount = to_cents(vat_amount);
        self.incl_vat_price = to_cents(incl_vat_price);
        Ok(self.total_price)
    }
}
