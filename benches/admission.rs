use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_tally::{
    CounterLayer, ExceptionFilterBuilder, LogRecord, OnlyExceptionFilter, RateLimiter,
    RateLimiterFilter, Severity, SystemClock,
};

/// Benchmark sliding-window admission with different quotas
fn bench_rate_limiter_admit(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limiter_admit");
    group.throughput(Throughput::Elements(1000));

    for max_calls in [1usize, 100, 10_000] {
        group.bench_with_input(
            BenchmarkId::new("admit", max_calls),
            &max_calls,
            |b, &max_calls| {
                let limiter = RateLimiter::new(
                    max_calls,
                    Duration::from_secs(60),
                    Arc::new(SystemClock::new()),
                );
                b.iter(|| {
                    for _ in 0..1000 {
                        black_box(limiter.admit());
                    }
                })
            },
        );
    }

    group.finish();
}

/// Benchmark per-record filter decisions
fn bench_filter_keep(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_keep");

    let plain = LogRecord::new(Severity::INFO, "request handled");
    let matching = LogRecord::exception("TimedOut", "upstream timed out after 30s", "call failed");
    let other = LogRecord::exception("Parse", "unexpected token", "bad payload");

    let only_exceptions = OnlyExceptionFilter::only_exceptions();
    group.bench_function("only_exception", |b| {
        b.iter(|| black_box(only_exceptions.keep(black_box(&plain))))
    });

    let rate_limited = RateLimiterFilter::rate_limited(10, Duration::from_secs(600));
    group.bench_function("rate_limiter", |b| {
        b.iter(|| black_box(rate_limited.keep(black_box(&plain))))
    });

    let substrings = ExceptionFilterBuilder::new("Io")
        .with_messages(["timed out", "connection reset"])
        .build_skip_messages()
        .unwrap();
    group.bench_function("skip_messages_substring_match", |b| {
        b.iter(|| black_box(substrings.keep(black_box(&matching))))
    });
    group.bench_function("skip_messages_kind_miss", |b| {
        b.iter(|| black_box(substrings.keep(black_box(&other))))
    });

    let regexes = ExceptionFilterBuilder::new("Io")
        .with_regex([r"upstream timed out after [0-9]+s"])
        .build_rate_limited(5, Duration::from_secs(60))
        .unwrap();
    group.bench_function("rate_limited_regex_match", |b| {
        b.iter(|| black_box(regexes.keep(black_box(&matching))))
    });

    group.finish();
}

/// Benchmark tallying, single-threaded and contended
fn bench_counter_intake(c: &mut Criterion) {
    let mut group = c.benchmark_group("counter_intake");
    let record = LogRecord::new(Severity::WARNING, "disk almost full");

    group.throughput(Throughput::Elements(1000));
    group.bench_function("single_threaded", |b| {
        let counter = CounterLayer::new();
        b.iter(|| {
            for _ in 0..1000 {
                counter.intake(black_box(&record));
            }
        })
    });

    for thread_count in [2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("threads", thread_count),
            &thread_count,
            |b, &thread_count| {
                let counter = Arc::new(CounterLayer::new());
                b.iter(|| {
                    let handles: Vec<_> = (0..thread_count)
                        .map(|_| {
                            let counter = Arc::clone(&counter);
                            let record = record.clone();
                            thread::spawn(move || {
                                for _ in 0..1000 / thread_count {
                                    counter.intake(&record);
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                })
            },
        );
    }

    group.bench_function("dump_json", |b| {
        let counter = CounterLayer::new();
        for severity in [10, 20, 30, 40, 50, 35] {
            counter.intake(&LogRecord::new(Severity::new(severity), "seed"));
        }
        b.iter(|| black_box(counter.dump_json().unwrap()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_rate_limiter_admit,
    bench_filter_keep,
    bench_counter_intake
);
criterion_main!(benches);
