use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

/// Event store held entirely in process memory.
///
/// Used by tests and by deployments that run without `DATABASE_URL`.
/// The log is a single vector; an event's position is its index plus one.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored events.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }
}

fn stream_version(log: &[EventEnvelope], aggregate_id: AggregateId) -> Version {
    log.iter()
        .filter(|e| e.aggregate_id == aggregate_id)
        .map(|e| e.version)
        .max()
        .unwrap_or(Version::initial())
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let first_new_version = events[0].version;

        let mut log = self.events.write().await;
        let current = stream_version(&log, aggregate_id);

        if let Some(expected) = options.expected_version
            && current != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current,
            });
        }

        // Mirrors the (aggregate_id, version) unique constraint in Postgres.
        if first_new_version != current.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version.unwrap_or(current),
                actual: current,
            });
        }

        let mut last_version = current;
        for mut event in events {
            event.position = log.len() as i64 + 1;
            last_version = event.version;
            log.push(event);
        }

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.events.read().await;
        let mut events: Vec<_> = log
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        let log = self.events.read().await;
        Ok(log
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect())
    }

    async fn stream_from(&self, position: i64) -> Result<EventStream> {
        use futures_util::stream;

        let log = self.events.read().await;
        let start = usize::try_from(position.max(0)).unwrap_or(usize::MAX);
        let tail: Vec<EventEnvelope> = log.iter().skip(start).cloned().collect();

        Ok(Box::pin(stream::iter(tail.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let log = self.events.read().await;
        Ok(log
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;
    use crate::store::EventStoreExt;

    fn event(aggregate_id: AggregateId, version: i64, event_type: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Order")
            .event_type(event_type)
            .version(Version::new(version))
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn append_assigns_positions_in_order() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        store
            .append(
                vec![event(a, 1, "OrderPlaced"), event(a, 2, "OrderPaid")],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();
        store
            .append_event(event(b, 1, "OrderPlaced"), AppendOptions::expect_new())
            .await
            .unwrap();

        let all: Vec<_> = store
            .stream_from(0)
            .await
            .unwrap()
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|r| r.unwrap().position)
            .collect();
        assert_eq!(all, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn stream_from_skips_seen_positions() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store
            .append(
                vec![
                    event(id, 1, "OrderPlaced"),
                    event(id, 2, "OrderPaid"),
                    event(id, 3, "OrderShipped"),
                ],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        let tail: Vec<_> = store
            .stream_from(2)
            .await
            .unwrap()
            .collect::<Vec<_>>()
            .await;
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].as_ref().unwrap().event_type, "OrderShipped");
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store
            .append_event(event(id, 1, "CartItemAdded"), AppendOptions::expect_new())
            .await
            .unwrap();

        let err = store
            .append_event(event(id, 1, "CartItemAdded"), AppendOptions::expect_new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EventStoreError::ConcurrencyConflict { actual, .. } if actual == Version::first()
        ));
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn unchecked_append_still_rejects_duplicate_version() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store
            .append_event(event(id, 1, "OrderPlaced"), AppendOptions::new())
            .await
            .unwrap();

        let result = store
            .append_event(event(id, 1, "OrderPlaced"), AppendOptions::new())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn events_by_type_filters_across_streams() {
        let store = InMemoryEventStore::new();
        for _ in 0..3 {
            store
                .append_event(
                    event(AggregateId::new(), 1, "CheckoutStarted"),
                    AppendOptions::expect_new(),
                )
                .await
                .unwrap();
        }
        store
            .append_event(
                event(AggregateId::new(), 1, "OrderPlaced"),
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        let started = store.get_events_by_type("CheckoutStarted").await.unwrap();
        assert_eq!(started.len(), 3);
    }

    #[tokio::test]
    async fn version_of_unknown_stream_is_none() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        assert_eq!(store.get_aggregate_version(id).await.unwrap(), None);
        assert!(!store.aggregate_exists(id).await.unwrap());
    }
}
