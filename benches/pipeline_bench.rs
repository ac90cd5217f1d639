//! Benchmarks for the errorcast capture-to-dispatch pipeline
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use errorcast::event::{ErrorEvent, RawError, Severity};
use errorcast::websocket::{
    BroadcastHub, Filter, FilterSpec, HubConfig, ServerMessage, SubscriptionRegistry,
};

const ERROR_TYPES: [&str; 6] = ["network", "overflow", "ui", "null_reference", "state", "navigation"];

fn create_test_events(count: usize) -> Vec<ErrorEvent> {
    (0..count)
        .map(|i| {
            let severity = Severity::all()[i % Severity::all().len()];
            ErrorEvent::capture(
                RawError::new(ERROR_TYPES[i % ERROR_TYPES.len()], format!("bench error {}", i))
                    .severity(severity)
                    .context("widgetPath", "Home/List/Item")
                    .context("routeName", "/home"),
            )
            .unwrap()
        })
        .collect()
}

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");
    let events = create_test_events(1000);

    group.throughput(Throughput::Elements(events.len() as u64));
    group.bench_function("analyze_1000", |b| {
        b.iter(|| {
            for event in &events {
                black_box(errorcast::analyze(event.clone()));
            }
        })
    });

    let analyzed = errorcast::analyze(events[1].clone());
    group.bench_function("encode_flutter_error", |b| {
        b.iter(|| ServerMessage::from(black_box(&analyzed)).encode().unwrap())
    });

    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");
    let events = create_test_events(1000);

    let wildcard = Filter::all();
    let narrow = Filter::from_spec(&FilterSpec {
        error_types: vec!["network".to_string(), "Overflow".to_string()],
        severity_levels: vec!["error".to_string(), "fatal".to_string()],
    });

    group.throughput(Throughput::Elements(events.len() as u64));
    group.bench_function("wildcard", |b| {
        b.iter(|| events.iter().filter(|e| wildcard.accepts(black_box(e))).count())
    });
    group.bench_function("narrow", |b| {
        b.iter(|| events.iter().filter(|e| narrow.accepts(black_box(e))).count())
    });

    group.finish();
}

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");
    let event = create_test_events(2).pop().unwrap();

    for subscribers in [10, 100, 1000] {
        let mut registry = SubscriptionRegistry::new();
        for i in 0..subscribers {
            let id = format!("conn-{}", i);
            registry.register(&id);
            let filter = if i % 2 == 0 {
                Filter::all()
            } else {
                Filter::from_spec(&FilterSpec {
                    error_types: vec![ERROR_TYPES[i % ERROR_TYPES.len()].to_string()],
                    severity_levels: vec!["all".to_string()],
                })
            };
            registry.update_filter(&id, filter);
        }

        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_with_input(
            BenchmarkId::new("matching_ids", subscribers),
            &registry,
            |b, registry| b.iter(|| registry.matching_ids(black_box(&event))),
        );
    }

    group.finish();
}

fn bench_publish(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let hub = BroadcastHub::new(HubConfig::default());
    let events = create_test_events(100);

    c.bench_function("publish_no_subscribers_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                for event in &events {
                    black_box(hub.publish(event.clone()).await);
                }
            })
        })
    });
}

criterion_group!(benches, bench_analyze, bench_filter, bench_registry, bench_publish);
criterion_main!(benches);
