//! Domain service - business logic orchestration
//!
//! Each operation loads what it needs, applies the aggregate rules in memory and
//! hands the result to a single repository call, so derivation and persistence
//! stay separate steps.

mod accounts;
mod cart;
mod catalog;
mod messaging;
mod orders;

pub use catalog::NewProduct;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::events::{DomainEvent, EventPublisher};
use crate::domain::repository::ShopRepository;
use crate::{Result, ShopError};

/// Retries after a stale cart write or a reference number collision.
const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(10);

/// Domain service for the storefront
pub struct ShopService {
    repo: Arc<dyn ShopRepository>,
    events: Arc<dyn EventPublisher>,
    /// Serializes account provisioning so employee loads are read and written in turn
    signup: Mutex<()>,
}

impl ShopService {
    pub fn new(repo: Arc<dyn ShopRepository>, events: Arc<dyn EventPublisher>) -> Self {
        Self { repo, events, signup: Mutex::new(()) }
    }

    async fn publish(&self, event: DomainEvent) {
        let kind = event.kind();
        if let Err(e) = self.events.publish(event).await {
            warn!(kind, error = %e, "event not published");
        }
    }

    /// Re-runs `operation` from scratch while it loses a race.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err @ (ShopError::Conflict | ShopError::CodeCollision(_))) if retries < MAX_RETRIES => {
                    retries += 1;
                    let delay = RETRY_BASE_DELAY * 2u32.pow(retries - 1);
                    warn!(operation, retries, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
