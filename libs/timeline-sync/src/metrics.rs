//! Timeline engine metrics for observability

use prometheus::{CounterVec, Opts, Registry};
use std::sync::OnceLock;

static METRICS: OnceLock<TimelineMetricsInner> = OnceLock::new();

struct TimelineMetricsInner {
    fetches: CounterVec,
    fetch_errors: CounterVec,
    single_flight_joins: CounterVec,
    invalidations: CounterVec,
    mutations: CounterVec,
    rollbacks: CounterVec,
}

impl TimelineMetricsInner {
    fn new() -> Self {
        Self {
            fetches: CounterVec::new(
                Opts::new("timeline_fetches_total", "Total transport fetches per feed"),
                &["kind", "direction"],
            )
            .expect("valid metric definition"),
            fetch_errors: CounterVec::new(
                Opts::new("timeline_fetch_errors_total", "Total failed feed fetches"),
                &["kind", "error_type"],
            )
            .expect("valid metric definition"),
            single_flight_joins: CounterVec::new(
                Opts::new(
                    "timeline_single_flight_joins_total",
                    "Fetch requests that attached to an in-flight fetch",
                ),
                &["kind"],
            )
            .expect("valid metric definition"),
            invalidations: CounterVec::new(
                Opts::new(
                    "timeline_invalidations_total",
                    "Total feed entries marked stale",
                ),
                &["kind"],
            )
            .expect("valid metric definition"),
            mutations: CounterVec::new(
                Opts::new("timeline_mutations_total", "Total coordinated mutations"),
                &["intent", "outcome"],
            )
            .expect("valid metric definition"),
            rollbacks: CounterVec::new(
                Opts::new(
                    "timeline_rollbacks_total",
                    "Feed entries restored after a failed mutation",
                ),
                &["intent"],
            )
            .expect("valid metric definition"),
        }
    }

    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.fetches.clone()))?;
        registry.register(Box::new(self.fetch_errors.clone()))?;
        registry.register(Box::new(self.single_flight_joins.clone()))?;
        registry.register(Box::new(self.invalidations.clone()))?;
        registry.register(Box::new(self.mutations.clone()))?;
        registry.register(Box::new(self.rollbacks.clone()))?;
        Ok(())
    }
}

fn get_metrics() -> &'static TimelineMetricsInner {
    METRICS.get_or_init(TimelineMetricsInner::new)
}

/// Timeline metrics wrapper
#[derive(Clone, Default)]
pub struct TimelineMetrics;

impl TimelineMetrics {
    pub fn new() -> Self {
        Self
    }

    /// Register metrics with a Prometheus registry
    pub fn register(registry: &Registry) -> Result<(), prometheus::Error> {
        get_metrics().register(registry)
    }

    pub fn record_fetch(&self, kind: &str, direction: &str) {
        get_metrics()
            .fetches
            .with_label_values(&[kind, direction])
            .inc();
    }

    pub fn record_fetch_error(&self, kind: &str, error_type: &str) {
        get_metrics()
            .fetch_errors
            .with_label_values(&[kind, error_type])
            .inc();
    }

    pub fn record_single_flight_join(&self, kind: &str) {
        get_metrics()
            .single_flight_joins
            .with_label_values(&[kind])
            .inc();
    }

    pub fn record_invalidation(&self, kind: &str) {
        get_metrics().invalidations.with_label_values(&[kind]).inc();
    }

    pub fn record_mutation(&self, intent: &str, outcome: &str) {
        get_metrics()
            .mutations
            .with_label_values(&[intent, outcome])
            .inc();
    }

    pub fn record_rollback(&self, intent: &str) {
        get_metrics().rollbacks.with_label_values(&[intent]).inc();
    }
}
