//! Saga error types.

use common::AggregateId;
use domain::{DomainError, ProductId};
use event_store::EventStoreError;
use projections::ProjectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SagaError {
    #[error("no items selected for checkout")]
    NoItemsSelected,

    #[error("product not found: {product_id}")]
    ProductNotFound { product_id: ProductId },

    #[error("insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The inventory service or a remote order ledger failed or timed out.
    #[error("upstream service failed: {0}")]
    Upstream(String),

    /// The remote ledger already has an order with this id.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("checkout not found: {0}")]
    NotFound(AggregateId),

    #[error("checkout has already been started")]
    AlreadyStarted,

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagaError {
    /// Short label used for the `reason` metric tag.
    pub fn reason(&self) -> &'static str {
        match self {
            SagaError::NoItemsSelected => "no_items_selected",
            SagaError::ProductNotFound { .. } => "product_not_found",
            SagaError::InsufficientStock { .. } => "insufficient_stock",
            SagaError::Upstream(_) => "upstream",
            SagaError::Conflict(_) => "conflict",
            SagaError::NotFound(_) => "not_found",
            SagaError::AlreadyStarted => "already_started",
            SagaError::Domain(_) => "domain",
            SagaError::EventStore(_) => "event_store",
            SagaError::Projection(_) => "projection",
            SagaError::Serialization(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, SagaError>;
