//! Projection processor for feeding events to projections.

use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::Projection;

/// Feeds stored events to registered projections.
///
/// - Catch-up: reads the log from the lowest position any projection has
///   reached and delivers each event to the projections that are behind it
/// - Single event delivery
/// - Rebuild: resets every projection and replays from the start
///
/// Catch-up runs are serialized, so concurrent readers asking for fresh
/// data never deliver the same event twice.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    catch_up_lock: Mutex<()>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            catch_up_lock: Mutex::new(()),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Brings every projection up to the end of the log. Returns how many
    /// events were read.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let _guard = self.catch_up_lock.lock().await;

        let mut from = i64::MAX;
        for projection in &self.projections {
            from = from.min(projection.position().await.last_position);
        }
        if self.projections.is_empty() {
            return Ok(0);
        }

        let mut stream = self.store.stream_from(from).await?;
        let mut read: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            read += 1;

            for projection in &self.projections {
                if projection.position().await.last_position < event.position {
                    projection.handle(&event).await?;
                    metrics::counter!("projections_events_processed").increment(1);
                }
            }
        }

        if read > 0 {
            tracing::debug!(from, events_read = read, "catch-up complete");
        }
        Ok(read)
    }

    /// Delivers one event to every registered projection.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<()> {
        for projection in &self.projections {
            projection.handle(event).await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            projection.reset().await?;
            tracing::info!(projection = projection.name(), "projection reset");
        }
        self.run_catch_up().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::ProjectionPosition;
    use async_trait::async_trait;
    use common::AggregateId;
    use event_store::{AppendOptions, InMemoryEventStore, Version};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    struct CountingProjection {
        count: Arc<RwLock<u64>>,
        position: Arc<RwLock<ProjectionPosition>>,
    }

    impl CountingProjection {
        fn new() -> Self {
            Self {
                count: Arc::new(RwLock::new(0)),
                position: Arc::new(RwLock::new(ProjectionPosition::zero())),
            }
        }
    }

    #[async_trait]
    impl Projection for CountingProjection {
        fn name(&self) -> &'static str {
            "CountingProjection"
        }

        async fn handle(&self, event: &EventEnvelope) -> Result<()> {
            *self.count.write().await += 1;
            let mut pos = self.position.write().await;
            *pos = pos.advance_to(event.position);
            Ok(())
        }

        async fn position(&self) -> ProjectionPosition {
            *self.position.read().await
        }

        async fn reset(&self) -> Result<()> {
            *self.count.write().await = 0;
            *self.position.write().await = ProjectionPosition::zero();
            Ok(())
        }
    }

    fn event(aggregate_id: AggregateId, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Order")
            .event_type("TestEvent")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({"test": true}))
            .build()
            .unwrap()
    }

    async fn seeded(count: i64) -> (InMemoryEventStore, AggregateId) {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        let events = (1..=count).map(|v| event(id, v)).collect();
        store.append(events, AppendOptions::new()).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn catch_up_processes_all_events() {
        let (store, _) = seeded(3).await;
        let projection = CountingProjection::new();
        let count = Arc::clone(&projection.count);

        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(projection));

        assert_eq!(processor.run_catch_up().await.unwrap(), 3);
        assert_eq!(*count.read().await, 3);
    }

    #[tokio::test]
    async fn second_catch_up_reads_only_new_events() {
        let (store, id) = seeded(3).await;
        let projection = CountingProjection::new();
        let count = Arc::clone(&projection.count);

        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(projection));
        processor.run_catch_up().await.unwrap();

        store
            .append(vec![event(id, 4)], AppendOptions::expect_version(Version::new(3)))
            .await
            .unwrap();

        assert_eq!(processor.run_catch_up().await.unwrap(), 1);
        assert_eq!(*count.read().await, 4);
        assert_eq!(processor.run_catch_up().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn late_projection_catches_up_without_replaying_others() {
        let (store, _) = seeded(2).await;
        let early = CountingProjection::new();
        let early_count = Arc::clone(&early.count);

        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(early));
        processor.run_catch_up().await.unwrap();

        let late = CountingProjection::new();
        let late_count = Arc::clone(&late.count);
        processor.register(Box::new(late));
        processor.run_catch_up().await.unwrap();

        assert_eq!(*early_count.read().await, 2);
        assert_eq!(*late_count.read().await, 2);
    }

    #[tokio::test]
    async fn rebuild_resets_and_replays() {
        let (store, _) = seeded(2).await;
        let projection = CountingProjection::new();
        let count = Arc::clone(&projection.count);
        let position = Arc::clone(&projection.position);

        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(projection));

        processor.run_catch_up().await.unwrap();
        processor.rebuild_all().await.unwrap();

        assert_eq!(*count.read().await, 2);
        assert_eq!(position.read().await.last_position, 2);
    }

    #[tokio::test]
    async fn process_single_event() {
        let projection = CountingProjection::new();
        let count = Arc::clone(&projection.count);

        let mut processor = ProjectionProcessor::new(InMemoryEventStore::new());
        processor.register(Box::new(projection));
        processor
            .process_event(&event(AggregateId::new(), 1))
            .await
            .unwrap();

        assert_eq!(*count.read().await, 1);
    }

    #[tokio::test]
    async fn empty_processor_reads_nothing() {
        let (store, _) = seeded(2).await;
        let processor = ProjectionProcessor::new(store);
        assert_eq!(processor.projection_count(), 0);
        assert_eq!(processor.run_catch_up().await.unwrap(), 0);
    }
}
