use crate::config::ForwarderConfig;
use anyhow::Context;
use bytes::Bytes;
use preprocess::EncodedImage;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;

/// Multipart field name the inference backend reads the image from.
pub const BACKEND_FILE_FIELD: &str = "uploadFile";

/// The backend's successful reply, relayed verbatim to the client.
#[derive(Debug, Clone)]
pub struct ForwardResult {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Backend unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("Backend returned {status}")]
    Status { status: StatusCode, body: Bytes },

    #[error("Invalid multipart part: {0}")]
    InvalidPart(#[source] reqwest::Error),
}

/// Posts normalized images to the inference backend.
///
/// Holds a single pooled `reqwest::Client`; clones share the pool, so one
/// forwarder serves every concurrent request.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    backend_url: Url,
}

impl Forwarder {
    pub fn new(config: &ForwarderConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .context("Failed to build backend HTTP client")?;

        Ok(Self {
            client,
            backend_url: config.backend_url.clone(),
        })
    }

    pub fn backend_url(&self) -> &Url {
        &self.backend_url
    }

    /// Send one image to the backend. Exactly one attempt is made.
    ///
    /// Dropping the returned future aborts the in-flight request, which is
    /// what happens when the client that triggered it disconnects.
    pub async fn forward(
        &self,
        image: EncodedImage,
        filename: &str,
    ) -> Result<ForwardResult, ForwardError> {
        let mime = image.mime_type();
        let len = image.bytes.len();

        let part = Part::bytes(image.bytes)
            .file_name(filename.to_string())
            .mime_str(mime)
            .map_err(ForwardError::InvalidPart)?;
        let form = Form::new().part(BACKEND_FILE_FIELD, part);

        tracing::debug!(
            url = %self.backend_url,
            filename,
            mime,
            bytes = len,
            "Forwarding image to backend"
        );

        let response = self
            .client
            .post(self.backend_url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(ForwardError::Unreachable)?;

        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = response.bytes().await.map_err(ForwardError::Unreachable)?;

        if status != StatusCode::OK {
            return Err(ForwardError::Status { status, body });
        }

        tracing::debug!(status = status.as_u16(), bytes = body.len(), "Backend replied");

        Ok(ForwardResult {
            status,
            content_type,
            body,
        })
    }
}
