//! Identifier types shared across the fulfillment workspace.

pub mod types;

pub use types::{AggregateId, ParseIdError, UserId};
