//! NATS event publisher

use async_trait::async_trait;

use crate::domain::events::{DomainEvent, EventPublisher};

/// Subject prefix; events go to `ventashop.<kind>`.
pub const SUBJECT_PREFIX: &str = "ventashop";

pub struct NatsEventPublisher {
    client: async_nats::Client,
}

impl NatsEventPublisher {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = async_nats::connect(url).await?;
        Ok(Self { client })
    }

    pub fn subject(event: &DomainEvent) -> String {
        format!("{SUBJECT_PREFIX}.{}", event.kind())
    }
}

#[async_trait]
impl EventPublisher for NatsEventPublisher {
    async fn publish(&self, event: DomainEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(&event)?;
        self.client.publish(Self::subject(&event), payload.into()).await?;
        Ok(())
    }
}
