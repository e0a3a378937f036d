use tracing::info;

use super::ShopService;
use crate::domain::aggregates::conversation::most_recent;
use crate::domain::aggregates::{Conversation, Message};
use crate::domain::events::{DomainEvent, MessageEvent};
use crate::domain::value_objects::{ConversationId, MessageId, UserId};
use crate::{Result, ShopError};

impl ShopService {
    /// Least recently modified first.
    pub async fn conversations_for(&self, user_id: UserId) -> Result<Vec<Conversation>> {
        self.repo.list_conversations(user_id).await
    }

    pub async fn conversation(&self, id: ConversationId) -> Result<Conversation> {
        self.repo.find_conversation(id).await?.ok_or(ShopError::ConversationNotFound)
    }

    pub async fn post_message(&self, conversation_id: ConversationId, author_id: UserId, content: &str) -> Result<Message> {
        let mut conversation = self.conversation(conversation_id).await?;
        self.user(author_id).await?;
        let message = conversation.post(author_id, content)?;
        self.repo.append_message(&conversation, &message).await?;
        info!(%conversation_id, message_id = %message.id, %author_id, "message posted");
        self.publish(DomainEvent::Message(MessageEvent::Posted { conversation_id, message_id: message.id, author_id }))
            .await;
        Ok(message)
    }

    /// Chronological. With `last`, only that many of the most recent messages.
    pub async fn messages(&self, conversation_id: ConversationId, last: Option<usize>) -> Result<Vec<Message>> {
        self.conversation(conversation_id).await?;
        let messages = self.repo.list_messages(conversation_id).await?;
        Ok(most_recent(messages, last))
    }

    pub async fn mark_message_read(&self, id: MessageId) -> Result<()> {
        self.repo.mark_message_read(id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::domain::aggregates::{CustomerAccount, User, UserProfile};
    use crate::domain::service::ShopService;
    use crate::domain::value_objects::MessageId;
    use crate::domain::NoOpEventPublisher;
    use crate::infra::memory::InMemoryRepository;
    use crate::ShopError;

    async fn setup() -> (ShopService, User, User, CustomerAccount) {
        let service = ShopService::new(Arc::new(InMemoryRepository::new()), Arc::new(NoOpEventPublisher));
        let employee = service
            .register_employee(UserProfile { email: "e@ventalis.test".into(), ..Default::default() })
            .await
            .unwrap();
        let (customer, account) = service
            .register_customer(UserProfile { email: "c@example.com".into(), ..Default::default() })
            .await
            .unwrap();
        (service, employee, customer, account)
    }

    #[tokio::test]
    async fn test_post_and_read_back() {
        let (service, employee, customer, account) = setup().await;
        let conversation_id = account.conversation_id.unwrap();

        for (author, text) in [(customer.id, "hello"), (employee.id, "hi"), (customer.id, "order?")] {
            service.post_message(conversation_id, author, text).await.unwrap();
        }

        let all = service.messages(conversation_id, None).await.unwrap();
        assert_eq!(all.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(), ["hello", "hi", "order?"]);
        let last = service.messages(conversation_id, Some(1)).await.unwrap();
        assert_eq!(last[0].content, "order?");

        let conversation = service.conversation(conversation_id).await.unwrap();
        assert!(conversation.modified_at >= conversation.created_at);
        assert_eq!(service.conversations_for(employee.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_read() {
        let (service, _, customer, account) = setup().await;
        let conversation_id = account.conversation_id.unwrap();
        let message = service.post_message(conversation_id, customer.id, "ping").await.unwrap();

        service.mark_message_read(message.id).await.unwrap();
        assert!(service.messages(conversation_id, None).await.unwrap()[0].is_read);
        assert!(matches!(service.mark_message_read(MessageId::new()).await, Err(ShopError::MessageNotFound)));
    }
}
