use once_cell::sync::Lazy;
use opentelemetry::metrics::Counter;
use opentelemetry::{KeyValue, global};

// Instruments shared by the poller and the upserter.
pub struct Metrics {
    polls_total: Counter<u64>,
    points_written_total: Counter<u64>,
    store_errors_total: Counter<u64>,
}

static METRICS: Lazy<Metrics> = Lazy::new(|| {
    let meter = global::meter("daily-metrics-poller");

    let polls_total = meter
        .u64_counter("dmp_polls_total")
        .with_description("API polls by outcome")
        .build();

    let points_written_total = meter
        .u64_counter("dmp_points_written_total")
        .with_description("Daily points written to the time-series store")
        .build();

    let store_errors_total = meter
        .u64_counter("dmp_store_errors_total")
        .with_description("Failed delete or write calls against the time-series store")
        .build();

    Metrics {
        polls_total,
        points_written_total,
        store_errors_total,
    }
});

pub fn inc_poll(outcome: &'static str) {
    METRICS
        .polls_total
        .add(1, &[KeyValue::new("outcome", outcome)]);
}

pub fn inc_points_written(n: u64) {
    METRICS.points_written_total.add(n, &[]);
}

pub fn inc_store_error(op: &'static str) {
    METRICS
        .store_errors_total
        .add(1, &[KeyValue::new("op", op)]);
}
