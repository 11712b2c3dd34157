//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// A fact recorded against an aggregate's stream.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Name stored in the envelope's `event_type` column.
    fn event_type(&self) -> &'static str;
}

/// An event-sourced entity rebuilt by replaying its stream.
///
/// Command methods on an aggregate inspect current state and return the
/// events to record; they never mutate. `apply` folds a recorded event into
/// state and must not fail, since the event has already happened.
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;

    type Error: std::error::Error + Send + Sync;

    /// Stream type name, e.g. `"Order"`.
    fn aggregate_type() -> &'static str;

    /// `None` until the first event has been applied.
    fn id(&self) -> Option<AggregateId>;

    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}
