//! Storage and messaging adapters for the domain ports

pub mod memory;
pub mod nats;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use nats::NatsEventPublisher;
pub use postgres::PgRepository;
