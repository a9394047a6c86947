//! Benchmarks for the aggregation kernel
//!
//! Run with: cargo bench -p windlass-engine
//!
//! Benchmark groups:
//! - temporal: grouped rolling sums over 24h windows
//! - event_bound: cumulative-sum differencing to the next bound event

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use windlass_core::{BoundDirection, BoundTarget, EventBounds, TemporalBounds};
use windlass_engine::{aggregate_event_bound, aggregate_temporal, Anchor, EventRow, PredicateFrame};

/// Generate a frame of `subjects` subjects with `events_each` hourly
/// events; every eighth event fires the bound predicate.
fn generate_frame(subjects: i64, events_each: usize) -> PredicateFrame {
    let base = Utc.with_ymd_and_hms(1989, 12, 1, 0, 0, 0).unwrap();
    let names = vec![
        "is_a".to_string(),
        "is_b".to_string(),
        "is_bound".to_string(),
        "_ANY_EVENT".to_string(),
    ];
    let mut rows = Vec::with_capacity(subjects as usize * events_each);
    for subject_id in 1..=subjects {
        for i in 0..events_each {
            rows.push(EventRow {
                subject_id,
                timestamp: Some(base + Duration::hours(i as i64)),
                counts: vec![
                    (i % 3 == 0) as i64,
                    (i % 5 == 0) as i64,
                    (i % 8 == 0) as i64,
                    1,
                ],
            });
        }
    }
    PredicateFrame::new(names, rows).expect("benchmark frame is well formed")
}

fn all_anchors(frame: &PredicateFrame) -> Vec<Anchor> {
    frame
        .subjects()
        .iter()
        .zip(frame.timestamps())
        .map(|(subject_id, timestamp)| Anchor {
            subject_id: *subject_id,
            timestamp: *timestamp,
        })
        .collect()
}

fn bench_temporal(c: &mut Criterion) {
    let mut group = c.benchmark_group("temporal");
    for subjects in [10i64, 100] {
        let frame = generate_frame(subjects, 200);
        let anchors = all_anchors(&frame);
        let bounds = TemporalBounds::new(true, Duration::hours(24), true);
        group.throughput(Throughput::Elements(anchors.len() as u64));
        group.bench_with_input(BenchmarkId::new("rolling_24h", subjects), &subjects, |b, _| {
            b.iter(|| aggregate_temporal(black_box(&frame), black_box(&bounds), black_box(&anchors)))
        });
    }
    group.finish();
}

fn bench_event_bound(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_bound");
    for subjects in [10i64, 100] {
        let frame = generate_frame(subjects, 200);
        let anchors = all_anchors(&frame);
        let bounds = EventBounds::new(
            true,
            BoundTarget::Predicate("is_bound".into()),
            BoundDirection::Forward,
            true,
        );
        group.throughput(Throughput::Elements(anchors.len() as u64));
        group.bench_with_input(BenchmarkId::new("to_next_bound", subjects), &subjects, |b, _| {
            b.iter(|| {
                aggregate_event_bound(black_box(&frame), black_box(&bounds), black_box(&anchors))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_temporal, bench_event_bound);
criterion_main!(benches);
