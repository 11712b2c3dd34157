//! Read models for the query side of the fulfillment pipeline.
//!
//! - [`Projection`] folds stored events into a read model
//! - [`ProjectionProcessor`] catches projections up from the global log
//! - [`OrderSummaryView`] lists orders by user, by status, or all of them
//! - [`PaymentLedgerView`] finds payments by order and lists them by user

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::{Page, PageRequest, ReadModel};
pub use views::{OrderPage, OrderSummaryView, PaymentLedgerView, PaymentPage};
