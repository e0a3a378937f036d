use tracing::info;

use super::ShopService;
use crate::domain::aggregates::{Comment, Order, OrderStatus, Role};
use crate::domain::codes;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::repository::OrderScope;
use crate::domain::value_objects::{OrderId, RefNumber, UserId};
use crate::{Result, ShopError};

impl ShopService {
    pub async fn order(&self, id: OrderId) -> Result<Order> {
        self.repo.find_order(id).await?.ok_or(ShopError::OrderNotFound)
    }

    pub async fn order_by_slug(&self, slug: &str) -> Result<Order> {
        self.repo.find_order_by_slug(slug).await?.ok_or(ShopError::OrderNotFound)
    }

    pub async fn add_comment(&self, order_id: OrderId, content: &str) -> Result<Comment> {
        self.order(order_id).await?;
        let comment = Comment::new(order_id, content)?;
        self.repo.insert_comment(&comment).await?;
        info!(%order_id, comment_id = %comment.id, "comment added");
        self.publish(DomainEvent::Order(OrderEvent::CommentAdded { order_id, comment_id: comment.id })).await;
        Ok(comment)
    }

    /// Most recent first.
    pub async fn comments(&self, order_id: OrderId) -> Result<Vec<Comment>> {
        self.order(order_id).await?;
        self.repo.list_comments(order_id).await
    }

    /// Administrative status change; any status may follow any other.
    pub async fn set_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut order = self.order(order_id).await?;
        let previous = order.status();
        order.set_status(status);
        self.repo.update_order_status(order_id, status).await?;
        info!(%order_id, from = previous.code(), to = status.code(), "order status changed");
        self.publish(DomainEvent::Order(OrderEvent::StatusChanged {
            order_id, status: status.code().to_string(),
        }))
        .await;
        Ok(order)
    }

    /// Orders visible to a user: its own as a customer, those of its assigned
    /// customers as an employee, all of them as an admin. Newest first.
    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let user = self.user(user_id).await?;
        let scope = match (user.role, user.reg_number) {
            (Role::Admin, _) => OrderScope::All,
            (Role::Customer, _) => OrderScope::Customer(user.id),
            (Role::Employee, Some(reg)) => OrderScope::Employee(reg),
            (Role::Employee, None) => return Ok(vec![]),
        };
        self.repo.list_orders(scope).await
    }

    pub(super) async fn fresh_ref_number(&self) -> Result<RefNumber> {
        let repo = &self.repo;
        let code = codes::unique_code(move |code| async move { repo.ref_number_exists(&code).await }).await?;
        Ok(RefNumber::new(code))
    }
}
