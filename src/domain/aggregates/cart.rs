//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::{LineItem, Owner, Product};
use crate::domain::pricing::total;
use crate::domain::value_objects::{AccountId, CartId, LineItemId, ProductId, Quantity};
use crate::{Result, ShopError};

#[derive(Clone, Debug, Serialize)]
pub struct Cart {
    id: CartId,
    account_id: Option<AccountId>,
    items: Vec<LineItem>,
    total_price: Decimal,
    /// Optimistic concurrency token, bumped by the repository on every save.
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Result of a cart mutation that may be skipped by the minimum quantity rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CartUpdate {
    Applied,
    BelowMinimum,
}

impl Cart {
    pub fn new(account_id: Option<AccountId>) -> Self {
        let now = Utc::now();
        Self {
            id: CartId::new(), account_id, items: vec![], total_price: Decimal::ZERO,
            version: 0, created_at: now, updated_at: now,
        }
    }

    /// Rebuilds a cart read back from storage.
    pub fn restore(
        id: CartId,
        account_id: Option<AccountId>,
        items: Vec<LineItem>,
        total_price: Decimal,
        version: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self { id, account_id, items, total_price, version, created_at, updated_at }
    }

    pub fn id(&self) -> CartId { self.id }
    pub fn account_id(&self) -> Option<AccountId> { self.account_id }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn total_price(&self) -> Decimal { self.total_price }
    pub fn version(&self) -> i64 { self.version }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn line_item(&self, product_id: ProductId) -> Option<&LineItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    pub(crate) fn set_version(&mut self, version: i64) { self.version = version; }

    /// Adds `quantity` of `product`. An existing line accumulates; a new line is
    /// only created at or above the minimum quantity.
    pub fn add_line_item(&mut self, product: &Product, quantity: u32) -> Result<CartUpdate> {
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == product.id) {
            let mut line = existing.clone();
            line.add_quantity(quantity);
            line.prepare(product)?;
            *existing = line;
        } else {
            if !Quantity::meets_minimum(quantity) { return Ok(CartUpdate::BelowMinimum); }
            self.items.push(LineItem::new(product, quantity, Owner::Cart(self.id))?);
        }
        self.calculate_total_price()?;
        Ok(CartUpdate::Applied)
    }

    /// Sets the quantity of `product`, creating the line if needed. Below the
    /// minimum nothing is touched.
    pub fn update_line_item(&mut self, product: &Product, quantity: u32) -> Result<CartUpdate> {
        if !Quantity::meets_minimum(quantity) { return Ok(CartUpdate::BelowMinimum); }
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == product.id) {
            let mut line = existing.clone();
            line.set_quantity(quantity);
            line.prepare(product)?;
            *existing = line;
        } else {
            self.items.push(LineItem::new(product, quantity, Owner::Cart(self.id))?);
        }
        self.calculate_total_price()?;
        Ok(CartUpdate::Applied)
    }

    pub fn remove_line_item(&mut self, line_item_id: LineItemId) -> Result<LineItem> {
        let pos = self.items.iter().position(|i| i.id == line_item_id).ok_or(ShopError::LineItemNotFound)?;
        let removed = self.items.remove(pos);
        self.calculate_total_price()?;
        Ok(removed)
    }

    pub fn empty(&mut self) -> Vec<LineItem> {
        let removed = std::mem::take(&mut self.items);
        self.total_price = Decimal::ZERO;
        self.touch();
        removed
    }

    /// Hands every line over to checkout, leaving the cart empty at zero.
    pub fn take_items(&mut self) -> Vec<LineItem> { self.empty() }

    pub fn calculate_total_price(&mut self) -> Result<Decimal> {
        self.total_price = total(self.items.iter().map(|i| i.price))?;
        self.touch();
        Ok(self.total_price)
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}
