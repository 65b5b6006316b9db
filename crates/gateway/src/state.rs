use crate::config::GatewayConfig;
use crate::forwarder::Forwarder;
use crate::metrics::UploadMetrics;
use crate::pipeline::UploadPipeline;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<UploadPipeline>,
    pub metrics: UploadMetrics,
}

impl AppState {
    /// Build the shared pipeline, including the pooled backend client.
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let forwarder = Forwarder::new(&config.forwarder_config())?;
        tracing::info!(
            backend = %forwarder.backend_url(),
            timeout_ms = config.backend_timeout.as_millis() as u64,
            "Backend client ready"
        );
        let metrics = UploadMetrics::default();
        let pipeline =
            UploadPipeline::with_metrics(config.pipeline_config(), forwarder, metrics.clone());

        Ok(Self {
            pipeline: Arc::new(pipeline),
            metrics,
        })
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.pipeline.config().max_upload_bytes
    }
}
