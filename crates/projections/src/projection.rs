//! Core projection trait and position tracking.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// How far a projection has read into the global event log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Global position of the last event seen, 0 before the first.
    pub last_position: i64,

    pub events_processed: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Position after seeing `event`, whether or not the projection cared
    /// about it.
    pub fn advance_to(&self, position: i64) -> Self {
        Self {
            last_position: position.max(self.last_position),
            events_processed: self.events_processed + 1,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "position({}, {} events)",
            self.last_position, self.events_processed
        )
    }
}

/// A projection folds stored events into a query-side read model.
///
/// `handle` receives every event in position order, including events of
/// streams the projection does not track, and must advance its position
/// for each one.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops everything the projection has built so it can replay.
    async fn reset(&self) -> Result<()>;
}
