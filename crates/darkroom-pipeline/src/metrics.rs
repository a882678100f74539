//! Prometheus metrics for Darkroom
//!
//! Queue-level counters live in `darkroom-broker`; this module adds the
//! pipeline-level counters and owns the Prometheus recorder exposed at
//! `/metrics`.

use std::time::Instant;

use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Metric names
pub mod names {
    // Inbound events
    pub const EVENTS_RECEIVED_TOTAL: &str = "darkroom_events_received_total";
    pub const EVENTS_PUBLISHED_TOTAL: &str = "darkroom_events_published_total";
    pub const NORMALIZATION_FAILURES_TOTAL: &str = "darkroom_normalization_failures_total";

    // Notifications
    pub const MAILS_SENT_TOTAL: &str = "darkroom_mails_sent_total";
    pub const MAILS_FAILED_TOTAL: &str = "darkroom_mails_failed_total";

    // System
    pub const UPTIME_SECONDS: &str = "darkroom_uptime_seconds";
    pub const INFO: &str = "darkroom_info";
}

/// Metrics recorder
#[derive(Clone)]
pub struct MetricsRecorder {
    handle: PrometheusHandle,
    start_time: Instant,
}

impl MetricsRecorder {
    /// Initialize the metrics system
    pub fn new() -> Self {
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .expect("Failed to install Prometheus recorder");

        gauge!(names::INFO, "version" => darkroom_core::VERSION).set(1.0);

        Self {
            handle,
            start_time: Instant::now(),
        }
    }

    /// Get metrics output in Prometheus format
    pub fn render(&self) -> String {
        gauge!(names::UPTIME_SECONDS).set(self.start_time.elapsed().as_secs_f64());
        self.handle.render()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
