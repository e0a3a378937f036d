//! Domain layer: aggregates, pricing rules and the service orchestrating them.

pub mod aggregates;
pub mod codes;
pub mod events;
pub mod pricing;
pub mod repository;
pub mod service;
pub mod value_objects;

pub use events::{DomainEvent, EventPublisher, NoOpEventPublisher};
pub use repository::ShopRepository;
pub use service::ShopService;
