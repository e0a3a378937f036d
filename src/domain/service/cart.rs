use std::collections::HashMap;
use tracing::{debug, info};

use super::ShopService;
use crate::domain::aggregates::{Cart, CartUpdate, Order};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{CartId, LineItemId, ProductId, Quantity};
use crate::{Result, ShopError};

impl ShopService {
    pub async fn cart(&self, id: CartId) -> Result<Cart> {
        self.repo.find_cart(id).await?.ok_or(ShopError::CartNotFound)
    }

    /// Adds to the product's line, accumulating. A new line below the minimum
    /// quantity is silently skipped and the cart comes back unchanged.
    pub async fn add_line_item(&self, cart_id: CartId, product_id: ProductId, quantity: u32) -> Result<Cart> {
        self.with_retry("add_line_item", move || self.try_add_line_item(cart_id, product_id, quantity)).await
    }

    async fn try_add_line_item(&self, cart_id: CartId, product_id: ProductId, quantity: u32) -> Result<Cart> {
        let mut cart = self.cart(cart_id).await?;
        let product = self.product(product_id).await?;
        if cart.add_line_item(&product, quantity)? == CartUpdate::BelowMinimum {
            debug!(%cart_id, %product_id, quantity, minimum = Quantity::MINIMUM, "add skipped, quantity below minimum");
            return Ok(cart);
        }
        self.store_cart(&mut cart).await?;
        info!(%cart_id, %product_id, quantity, total = %cart.total_price(), "line item added");
        Ok(cart)
    }

    /// Sets the product's line to `quantity`. Below the minimum nothing changes.
    pub async fn update_line_item(&self, cart_id: CartId, product_id: ProductId, quantity: u32) -> Result<Cart> {
        self.with_retry("update_line_item", move || self.try_update_line_item(cart_id, product_id, quantity)).await
    }

    async fn try_update_line_item(&self, cart_id: CartId, product_id: ProductId, quantity: u32) -> Result<Cart> {
        let mut cart = self.cart(cart_id).await?;
        let product = self.product(product_id).await?;
        if cart.update_line_item(&product, quantity)? == CartUpdate::BelowMinimum {
            debug!(%cart_id, %product_id, quantity, minimum = Quantity::MINIMUM, "update skipped, quantity below minimum");
            return Ok(cart);
        }
        self.store_cart(&mut cart).await?;
        info!(%cart_id, %product_id, quantity, total = %cart.total_price(), "line item updated");
        Ok(cart)
    }

    pub async fn remove_line_item(&self, line_item_id: LineItemId) -> Result<Cart> {
        self.with_retry("remove_line_item", move || self.try_remove_line_item(line_item_id)).await
    }

    async fn try_remove_line_item(&self, line_item_id: LineItemId) -> Result<Cart> {
        let mut cart = self.repo.find_cart_by_line_item(line_item_id).await?.ok_or(ShopError::LineItemNotFound)?;
        cart.remove_line_item(line_item_id)?;
        self.store_cart(&mut cart).await?;
        info!(cart_id = %cart.id(), %line_item_id, total = %cart.total_price(), "line item removed");
        Ok(cart)
    }

    pub async fn empty_cart(&self, cart_id: CartId) -> Result<Cart> {
        self.with_retry("empty_cart", move || self.try_empty_cart(cart_id)).await
    }

    async fn try_empty_cart(&self, cart_id: CartId) -> Result<Cart> {
        let mut cart = self.cart(cart_id).await?;
        let removed = cart.empty();
        self.store_cart(&mut cart).await?;
        info!(%cart_id, removed = removed.len(), "cart emptied");
        Ok(cart)
    }

    /// Recomputes the cart total from its lines; only writes when it moved.
    pub async fn calculate_total_price(&self, cart_id: CartId) -> Result<Cart> {
        self.with_retry("calculate_total_price", move || self.try_calculate_total_price(cart_id)).await
    }

    async fn try_calculate_total_price(&self, cart_id: CartId) -> Result<Cart> {
        let mut cart = self.cart(cart_id).await?;
        let stored = cart.total_price();
        if cart.calculate_total_price()? != stored {
            self.store_cart(&mut cart).await?;
            info!(%cart_id, %stored, total = %cart.total_price(), "cart total corrected");
        }
        Ok(cart)
    }

    /// Converts the cart into an order. A cart totalling zero yields no order.
    pub async fn make_order(&self, cart_id: CartId) -> Result<Option<Order>> {
        self.with_retry("make_order", move || self.try_make_order(cart_id)).await
    }

    async fn try_make_order(&self, cart_id: CartId) -> Result<Option<Order>> {
        let mut cart = self.cart(cart_id).await?;
        if cart.total_price().is_zero() {
            debug!(%cart_id, "checkout skipped, cart is empty");
            return Ok(None);
        }

        let product_ids: Vec<ProductId> = cart.items().iter().map(|i| i.product_id).collect();
        let products: HashMap<_, _> =
            self.repo.find_products(&product_ids).await?.into_iter().map(|p| (p.id, p)).collect();
        let ref_number = self.fresh_ref_number().await?;

        let (order, comment) = Order::place(&mut cart, ref_number, &products)?;
        let version = self.repo.place_order(&cart, &order, &comment).await?;
        cart.set_version(version);

        info!(
            %cart_id, order_id = %order.id(), ref_number = %order.ref_number(),
            total = %order.total_price(), lines = order.items().len(), "order placed"
        );
        self.publish(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id(),
            ref_number: order.ref_number().clone(),
            cart_id,
            account_id: order.account_id(),
            total: order.total_price(),
            at: order.created_at(),
        }))
        .await;
        Ok(Some(order))
    }

    async fn store_cart(&self, cart: &mut Cart) -> Result<()> {
        let version = self.repo.save_cart(cart).await?;
        cart.set_version(version);
        Ok(())
    }
}
