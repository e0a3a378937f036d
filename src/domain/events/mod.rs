//! Domain events
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{
    AccountId, CartId, CommentId, ConversationId, MessageId, OrderId, RefNumber, RegNumber, UserId,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
    Account(AccountEvent),
    Message(MessageEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: OrderId, ref_number: RefNumber, cart_id: CartId, account_id: Option<AccountId>, total: Decimal, at: DateTime<Utc> },
    CommentAdded { order_id: OrderId, comment_id: CommentId },
    StatusChanged { order_id: OrderId, status: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccountEvent {
    EmployeeRegistered { user_id: UserId, reg_number: RegNumber },
    Provisioned { account_id: AccountId, customer_id: UserId, employee_reg: RegNumber },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageEvent {
    Posted { conversation_id: ConversationId, message_id: MessageId, author_id: UserId },
}

impl DomainEvent {
    /// Dotted name used as the publishing subject suffix.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Order(OrderEvent::Placed { .. }) => "order.placed",
            Self::Order(OrderEvent::CommentAdded { .. }) => "order.comment_added",
            Self::Order(OrderEvent::StatusChanged { .. }) => "order.status_changed",
            Self::Account(AccountEvent::EmployeeRegistered { .. }) => "account.employee_registered",
            Self::Account(AccountEvent::Provisioned { .. }) => "account.provisioned",
            Self::Message(MessageEvent::Posted { .. }) => "message.posted",
        }
    }
}

/// Sink for events of committed changes.
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> anyhow::Result<()>;
}

/// Used when no broker is configured.
pub struct NoOpEventPublisher;

#[async_trait::async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _event: DomainEvent) -> anyhow::Result<()> {
        Ok(())
    }
}
