//! Ventashop - wholesale storefront service

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ventashop::api::{self, AppState};
use ventashop::config::Config;
use ventashop::domain::{EventPublisher, NoOpEventPublisher, ShopRepository, ShopService};
use ventashop::infra::{InMemoryRepository, NatsEventPublisher, PgRepository};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let repo: Arc<dyn ShopRepository> = match &config.database {
        Some(db) => {
            let repo = PgRepository::connect(&db.url, db.max_connections).await?;
            repo.migrate().await?;
            Arc::new(repo)
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(InMemoryRepository::new())
        }
    };

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match NatsEventPublisher::connect(url).await {
            Ok(publisher) => Arc::new(publisher),
            Err(e) => {
                warn!(error = %e, "NATS unavailable, events are dropped");
                Arc::new(NoOpEventPublisher)
            }
        },
        None => Arc::new(NoOpEventPublisher),
    };

    let state = AppState { service: Arc::new(ShopService::new(repo, events)) };
    let app = api::router(state);

    let address = config.server.address();
    info!("Ventashop listening on {}", address);
    axum::serve(tokio::net::TcpListener::bind(&address).await?, app).await?;
    Ok(())
}
