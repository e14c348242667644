//! Prometheus metrics for the search service.
//!
//! All series live in [`PROMETHEUS_REGISTRY`] and are exported by the
//! `/metrics` endpoint through [`gather_metrics`].
//!
//! # Example
//! ```no_run
//! use charmstore_search::metrics::SEARCH_REQUESTS_TOTAL;
//!
//! SEARCH_REQUESTS_TOTAL.with_label_values(&["success"]).inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Once;

const NAMESPACE: &str = "charmstore_search";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Search requests by outcome
    ///
    /// Labels: outcome (success, bad_request, unauthorized, error)
    pub static ref SEARCH_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_requests_total", "Total number of search requests")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create SEARCH_REQUESTS_TOTAL metric");

    /// Time spent executing a search against the index
    ///
    /// Labels: ordering (relevance, sorted)
    pub static ref SEARCH_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "search_duration_seconds",
            "Search execution duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["ordering"]
    ).expect("Failed to create SEARCH_DURATION_SECONDS metric");

    /// Hits dropped because a metadata section could not be resolved
    ///
    /// Labels: section
    pub static ref METADATA_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("metadata_failures_total", "Total number of failed metadata resolutions")
            .namespace(NAMESPACE),
        &["section"]
    ).expect("Failed to create METADATA_FAILURES_TOTAL metric");

    /// Index writes
    ///
    /// Labels: operation, status
    pub static ref INDEX_WRITES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("index_writes_total", "Total number of search index writes")
            .namespace(NAMESPACE),
        &["operation", "status"]
    ).expect("Failed to create INDEX_WRITES_TOTAL metric");

    /// Build information
    ///
    /// Labels: version
    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Build information")
            .namespace(NAMESPACE),
        &["version"]
    ).expect("Failed to create BUILD_INFO metric");
}

static INIT: Once = Once::new();

/// Register every metric with [`PROMETHEUS_REGISTRY`].
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let mut result = Ok(());
    INIT.call_once(|| {
        result = register_all();
    });
    result
}

fn register_all() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(SEARCH_REQUESTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SEARCH_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(METADATA_FAILURES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(INDEX_WRITES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(BUILD_INFO.clone()))?;

    BUILD_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Record the outcome of an index write
pub fn record_index_write<T, E>(operation: &str, result: &Result<T, E>) {
    let status = if result.is_ok() { "success" } else { "error" };
    INDEX_WRITES_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}

/// Export all metrics in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
