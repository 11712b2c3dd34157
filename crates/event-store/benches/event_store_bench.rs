use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{AppendOptions, EventEnvelope, EventStore, InMemoryEventStore, Version};
use futures_util::StreamExt;

fn payment_event(aggregate_id: AggregateId, version: i64) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Payment")
        .event_type("RefundRecorded")
        .version(Version::new(version))
        .payload_raw(serde_json::json!({
            "type": "RefundRecorded",
            "data": { "amount": 100, "reason": "bench" }
        }))
        .build()
        .unwrap()
}

fn bench_checked_append(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/checked_append_50", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let id = AggregateId::new();
                for v in 1..=50 {
                    store
                        .append(
                            vec![payment_event(id, v)],
                            AppendOptions::expect_version(Version::new(v - 1)),
                        )
                        .await
                        .unwrap();
                }
            });
        });
    });
}

fn bench_catch_up_stream(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(async {
        for _ in 0..500 {
            let id = AggregateId::new();
            store
                .append(vec![payment_event(id, 1)], AppendOptions::expect_new())
                .await
                .unwrap();
        }
    });

    c.bench_function("event_store/stream_from_500", |b| {
        b.iter(|| {
            rt.block_on(async {
                let count = store.stream_from(0).await.unwrap().count().await;
                assert_eq!(count, 500);
            });
        });
    });
}

criterion_group!(benches, bench_checked_append, bench_catch_up_stream);
criterion_main!(benches);
