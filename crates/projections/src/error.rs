//! Projection error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// A stored payload no longer matches the event schema.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("Projection error: {0}")]
    Projection(String),
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
