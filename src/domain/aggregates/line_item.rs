//! Line items: a priced quantity of one product, owned by a cart or an order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::Product;
use crate::domain::pricing::line_item_price;
use crate::domain::value_objects::{CartId, LineItemId, OrderId, ProductId, Quantity};
use crate::Result;

/// The single container a line item belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Owner {
    Cart(CartId),
    Order(OrderId),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// Cached `unit price × quantity` as of the last save.
    pub price: Decimal,
    pub owner: Owner,
}

impl LineItem {
    pub fn new(product: &Product, quantity: u32, owner: Owner) -> Result<Self> {
        let mut item = Self {
            id: LineItemId::new(),
            product_id: product.id,
            quantity: Quantity::new(quantity),
            price: Decimal::ZERO,
            owner,
        };
        item.prepare(product)?;
        Ok(item)
    }

    /// Derives the cached price from the product's current price.
    /// Must run before every write of the line.
    pub fn prepare(&mut self, product: &Product) -> Result<()> {
        debug_assert_eq!(self.product_id, product.id);
        self.price = line_item_price(product.price, self.quantity)?;
        Ok(())
    }

    pub fn set_quantity(&mut self, quantity: u32) { self.quantity = Quantity::new(quantity); }

    pub fn add_quantity(&mut self, quantity: u32) { self.quantity = self.quantity.add(quantity); }

    pub fn cart_id(&self) -> Option<CartId> {
        match self.owner { Owner::Cart(id) => Some(id), Owner::Order(_) => None }
    }

    pub fn order_id(&self) -> Option<OrderId> {
        match self.owner { Owner::Order(id) => Some(id), Owner::Cart(_) => None }
    }
}
