//! Prometheus collectors of the raft log.
//!
//! Collectors are created lazily and updated whether or not they are
//! registered; call [`register_metrics`] once to expose them through
//! [`REGISTRY`].

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::warn;


lazy_static! {
    /// Entries appended, by append path (`local`, `persisted`, `replicated`)
    pub static ref APPENDED_ENTRIES_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("raft_log_appended_entries_total", "Number of entries appended to the raft log"),
        &["partition", "path"]
    )
    .expect("metric can not be created");

    pub static ref FLUSH_DURATION_METRIC: HistogramVec = HistogramVec::new(
        HistogramOpts::new("raft_log_flush_duration_ms", "Histogram of journal flush duration in ms")
            .buckets(exponential_buckets(0.01, 2.0, 20).expect("valid buckets")),
        &["partition", "strategy"]
    )
    .expect("metric can not be created");

    pub static ref DELAYED_FLUSH_FAILURES_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("raft_log_delayed_flush_failures_total", "Number of failed delayed flush tasks"),
        &["partition"]
    )
    .expect("metric can not be created");

    pub static ref LAST_APPENDED_INDEX_METRIC: IntGaugeVec = IntGaugeVec::new(
        Opts::new("raft_log_last_appended_index", "Index of the last appended entry"),
        &["partition"]
    )
    .expect("metric can not be created");

    pub static ref COMMIT_INDEX_METRIC: IntGaugeVec = IntGaugeVec::new(
        Opts::new("raft_log_commit_index", "Commit index of the raft log"),
        &["partition"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

/// Registers every collector with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(APPENDED_ENTRIES_METRIC.clone()),
            Box::new(FLUSH_DURATION_METRIC.clone()),
            Box::new(DELAYED_FLUSH_FAILURES_METRIC.clone()),
            Box::new(LAST_APPENDED_INDEX_METRIC.clone()),
            Box::new(COMMIT_INDEX_METRIC.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                warn!("collector can not be registered: {}", e);
            }
        }
    });
}

/// Renders [`REGISTRY`] in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!("could not encode raft log metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
