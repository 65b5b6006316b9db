use anyhow::{Context, ensure};
use common::{env_opt, env_or};
use preprocess::NormalizeOptions;
use reqwest::Url;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub use common::Environment;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_BACKEND_URL: &str = "http://django:8000/ai/";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub listen_addr: SocketAddr,
    pub backend_url: Url,
    pub max_upload_bytes: usize,
    pub backend_timeout: Duration,
    pub connect_timeout: Duration,
    pub jpeg_quality: u8,
    pub max_image_dimension: u32,
    pub static_dir: Option<PathBuf>,
    pub otel_endpoint: Option<String>,
}

/// Settings for the backend HTTP client.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub backend_url: Url,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

/// Per-request limits and codec settings used by the upload pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_upload_bytes: usize,
    pub jpeg_quality: u8,
    pub normalize: NormalizeOptions,
}

impl GatewayConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();

        let listen_addr = env_or(
            "GATEWAY_LISTEN_ADDR",
            DEFAULT_LISTEN_ADDR.parse::<SocketAddr>()?,
        )?;

        let backend_url: String = env_or("GATEWAY_BACKEND_URL", DEFAULT_BACKEND_URL.to_string())?;
        let backend_url = Url::parse(&backend_url)
            .with_context(|| format!("invalid GATEWAY_BACKEND_URL {:?}", backend_url))?;

        let max_upload_bytes = env_or("GATEWAY_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        let backend_timeout_ms = env_or("GATEWAY_BACKEND_TIMEOUT_MS", DEFAULT_BACKEND_TIMEOUT_MS)?;
        let connect_timeout_ms = env_or("GATEWAY_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS)?;

        let jpeg_quality = env_or("GATEWAY_JPEG_QUALITY", preprocess::DEFAULT_JPEG_QUALITY)?;

        let max_image_dimension = env_or(
            "GATEWAY_MAX_IMAGE_DIMENSION",
            NormalizeOptions::default().max_dimension,
        )?;

        let static_dir = env_opt::<PathBuf>("GATEWAY_STATIC_DIR")?;
        let otel_endpoint = env_opt::<String>("GATEWAY_OTEL_ENDPOINT")?;

        let config = Self {
            environment,
            listen_addr,
            backend_url,
            max_upload_bytes,
            backend_timeout: Duration::from_millis(backend_timeout_ms),
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            jpeg_quality,
            max_image_dimension,
            static_dir,
            otel_endpoint,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            matches!(self.backend_url.scheme(), "http" | "https"),
            "GATEWAY_BACKEND_URL must be http or https, got {}",
            self.backend_url.scheme()
        );
        ensure!(
            self.max_upload_bytes > 0,
            "GATEWAY_MAX_UPLOAD_BYTES must be greater than zero"
        );
        ensure!(
            !self.backend_timeout.is_zero(),
            "GATEWAY_BACKEND_TIMEOUT_MS must be greater than zero"
        );
        ensure!(
            !self.connect_timeout.is_zero(),
            "GATEWAY_CONNECT_TIMEOUT_MS must be greater than zero"
        );
        ensure!(
            (1..=100).contains(&self.jpeg_quality),
            "GATEWAY_JPEG_QUALITY must be within 1..=100, got {}",
            self.jpeg_quality
        );
        ensure!(
            self.max_image_dimension >= preprocess::FEATURE_SIZE,
            "GATEWAY_MAX_IMAGE_DIMENSION must be at least {}",
            preprocess::FEATURE_SIZE
        );
        Ok(())
    }

    pub fn forwarder_config(&self) -> ForwarderConfig {
        ForwarderConfig {
            backend_url: self.backend_url.clone(),
            timeout: self.backend_timeout,
            connect_timeout: self.connect_timeout,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_upload_bytes: self.max_upload_bytes,
            jpeg_quality: self.jpeg_quality,
            normalize: NormalizeOptions {
                max_dimension: self.max_image_dimension,
                ..NormalizeOptions::default()
            },
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            backend_url: Url::parse(DEFAULT_BACKEND_URL).expect("default backend URL is valid"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            backend_timeout: Duration::from_millis(DEFAULT_BACKEND_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            jpeg_quality: preprocess::DEFAULT_JPEG_QUALITY,
            max_image_dimension: NormalizeOptions::default().max_dimension,
            static_dir: None,
            otel_endpoint: None,
        }
    }
}
