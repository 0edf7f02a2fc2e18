use prometheus::{Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tracing::warn;

const SERVICE: &str = "user-admin";

/// Application metrics collector
#[derive(Clone)]
pub struct AppMetrics {
    registry: Arc<Registry>,

    // HTTP metrics
    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: IntGauge,

    // Domain metrics
    pub exports_total: IntCounterVec,
    pub delete_sagas_total: IntCounterVec,

    // Application metrics
    pub application_info: IntGauge,
    pub application_uptime_seconds: Gauge,
}

impl AppMetrics {
    /// Create a new metrics collector with all metrics registered
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let http_requests_total = IntCounter::with_opts(
            Opts::new("http_requests_total", "Total number of HTTP requests processed").const_label("service", SERVICE),
        )?;

        let http_request_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request duration in seconds")
                .const_label("service", SERVICE)
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;

        let http_requests_in_flight = IntGauge::with_opts(
            Opts::new("http_requests_in_flight", "Number of HTTP requests currently being processed")
                .const_label("service", SERVICE),
        )?;

        let exports_total = IntCounterVec::new(
            Opts::new("user_exports_total", "Number of user report exports by format").const_label("service", SERVICE),
            &["format"],
        )?;

        let delete_sagas_total = IntCounterVec::new(
            Opts::new("user_delete_sagas_total", "Number of cascading user deletions by outcome")
                .const_label("service", SERVICE),
            &["outcome"],
        )?;

        let application_info = IntGauge::with_opts(
            Opts::new("application_info", "Application information")
                .const_label("service", SERVICE)
                .const_label("version", env!("CARGO_PKG_VERSION"))
                .const_label("rust_version", env!("RUSTC_VERSION"))
                .const_label("build_timestamp", env!("BUILD_TIMESTAMP")),
        )?;

        let application_uptime_seconds = Gauge::with_opts(
            Opts::new("application_uptime_seconds", "Application uptime in seconds").const_label("service", SERVICE),
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(exports_total.clone()))?;
        registry.register(Box::new(delete_sagas_total.clone()))?;
        registry.register(Box::new(application_info.clone()))?;
        registry.register(Box::new(application_uptime_seconds.clone()))?;

        application_info.set(1);

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            exports_total,
            delete_sagas_total,
            application_info,
            application_uptime_seconds,
        })
    }

    /// Record a finished HTTP request
    pub fn record_request(&self, duration_seconds: f64) {
        self.http_requests_total.inc();
        self.http_request_duration_seconds.observe(duration_seconds);
    }

    /// Record a generated export (`csv`, `pdf`, `xlsx`)
    pub fn record_export(&self, format: &str) {
        self.exports_total.with_label_values(&[format]).inc();
    }

    /// Record the outcome of a cascading delete
    pub fn record_delete_saga(&self, outcome: &str) {
        self.delete_sagas_total.with_label_values(&[outcome]).inc();
    }

    pub fn update_uptime(&self, uptime_seconds: f64) {
        self.application_uptime_seconds.set(uptime_seconds);
    }

    /// Get metrics as Prometheus text format
    pub fn gather(&self) -> String {
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        match encoder.encode_to_string(&metric_families) {
            Ok(output) => output,
            Err(e) => {
                warn!("Failed to encode metrics: {}", e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = AppMetrics::new().expect("Failed to create metrics");
        assert_eq!(metrics.http_requests_total.get(), 0);
        assert_eq!(metrics.application_info.get(), 1);
    }

    #[test]
    fn test_domain_counters() {
        let metrics = AppMetrics::new().expect("Failed to create metrics");

        metrics.record_export("csv");
        metrics.record_export("csv");
        metrics.record_export("pdf");
        metrics.record_delete_saga("completed");

        assert_eq!(metrics.exports_total.with_label_values(&["csv"]).get(), 2);
        assert_eq!(metrics.exports_total.with_label_values(&["pdf"]).get(), 1);
        assert_eq!(metrics.delete_sagas_total.with_label_values(&["completed"]).get(), 1);
    }

    #[test]
    fn test_metrics_gathering() {
        let metrics = AppMetrics::new().expect("Failed to create metrics");
        metrics.record_request(0.2);
        metrics.record_export("xlsx");

        let output = metrics.gather();
        assert!(output.contains("http_requests_total"));
        assert!(output.contains("user_exports_total"));
        assert!(output.contains("application_info"));
    }
}
