//! Append-only event log backing every owned record in the fulfillment
//! pipeline: carts, orders, payments and checkout sagas.
//!
//! Streams are keyed by [`AggregateId`] and versioned per stream; every
//! append names the version it expects, so two writers racing on the same
//! stream never both succeed. Each stored event also receives a global
//! position that read models use to catch up incrementally.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
