use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::time::Duration;

pub const METER_NAME: &str = "gateway";

/// Upload counters and latency histograms.
///
/// Instruments come from the global meter provider, so they are no-ops until
/// [`common::TelemetryGuard`] installs an exporter.
#[derive(Clone)]
pub struct UploadMetrics {
    uploads: Counter<u64>,
    upload_duration: Histogram<f64>,
    backend_duration: Histogram<f64>,
}

impl UploadMetrics {
    pub fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);

        let upload_buckets = [
            0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0, 10.0,
        ];
        let backend_buckets = [
            0.002, 0.005, 0.01, 0.025, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0,
        ];

        let uploads = meter
            .u64_counter("gateway_uploads_total")
            .with_description("Upload requests handled, by outcome")
            .build();
        let upload_duration = meter
            .f64_histogram("gateway_upload_duration_seconds")
            .with_description("Time to handle an upload (read + preprocess + forward)")
            .with_unit("s")
            .with_boundaries(upload_buckets.to_vec())
            .build();
        let backend_duration = meter
            .f64_histogram("gateway_backend_duration_seconds")
            .with_description("Time spent waiting on the inference backend")
            .with_unit("s")
            .with_boundaries(backend_buckets.to_vec())
            .build();

        Self {
            uploads,
            upload_duration,
            backend_duration,
        }
    }

    /// `outcome` is `"ok"` or an [`crate::error::UploadError::kind`] label.
    pub fn record_upload(&self, outcome: &'static str, elapsed: Duration) {
        let attrs = [KeyValue::new("outcome", outcome)];
        self.uploads.add(1, &attrs);
        self.upload_duration.record(elapsed.as_secs_f64(), &attrs);
    }

    pub fn record_backend(&self, elapsed: Duration) {
        self.backend_duration.record(elapsed.as_secs_f64(), &[]);
    }
}

impl Default for UploadMetrics {
    fn default() -> Self {
        Self::new(METER_NAME)
    }
}
