use crate::forwarder::ForwardError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use preprocess::PreprocessError;
use thiserror::Error;

/// Longest backend body excerpt written to logs.
const BACKEND_BODY_LOG_LIMIT: usize = 512;

/// Every way an upload request can fail, mapped one-to-one onto an HTTP status.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Malformed upload request: {0}")]
    MalformedRequest(String),

    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Image decode failed: {0}")]
    DecodeError(#[source] PreprocessError),

    #[error("Image encode failed: {0}")]
    EncodeError(#[source] PreprocessError),

    #[error("Backend unreachable: {0}")]
    BackendUnreachable(#[source] reqwest::Error),

    #[error("Backend returned {status}")]
    BackendError { status: StatusCode, body: Bytes },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    /// Stable label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::MalformedRequest(_) => "malformed_request",
            UploadError::PayloadTooLarge { .. } => "payload_too_large",
            UploadError::UnsupportedFormat => "unsupported_format",
            UploadError::DecodeError(_) => "decode_error",
            UploadError::EncodeError(_) => "encode_error",
            UploadError::BackendUnreachable(_) => "backend_unreachable",
            UploadError::BackendError { .. } => "backend_error",
            UploadError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::MalformedRequest(_) | UploadError::UnsupportedFormat => {
                StatusCode::BAD_REQUEST
            }
            UploadError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::DecodeError(_)
            | UploadError::EncodeError(_)
            | UploadError::BackendUnreachable(_)
            | UploadError::BackendError { .. }
            | UploadError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Generic text sent to the client. Never includes backend details.
    pub fn client_message(&self) -> &'static str {
        match self {
            UploadError::MalformedRequest(_) => "malformed upload request",
            UploadError::PayloadTooLarge { .. } => "upload exceeds size limit",
            UploadError::UnsupportedFormat => "unsupported image format",
            UploadError::DecodeError(_) | UploadError::EncodeError(_) => "failed to process image",
            UploadError::BackendUnreachable(_) => "prediction service unavailable",
            UploadError::BackendError { .. } => "prediction service error",
            UploadError::Internal(_) => "internal error",
        }
    }

    /// Client errors log at warn, server-side failures at error with full detail.
    pub fn log(&self) {
        let kind = self.kind();
        let status = self.status_code().as_u16();

        match self {
            UploadError::BackendError { status: backend_status, body } => {
                let excerpt = &body[..body.len().min(BACKEND_BODY_LOG_LIMIT)];
                tracing::error!(
                    kind,
                    status,
                    backend_status = backend_status.as_u16(),
                    backend_body = %String::from_utf8_lossy(excerpt),
                    "Upload failed: backend rejected request"
                );
            }
            _ if self.status_code().is_client_error() => {
                tracing::warn!(kind, status, error = %self, "Upload rejected");
            }
            _ => {
                tracing::error!(kind, status, error = %self, "Upload failed");
            }
        }
    }
}

impl From<PreprocessError> for UploadError {
    fn from(err: PreprocessError) -> Self {
        match err {
            PreprocessError::UnsupportedFormat => UploadError::UnsupportedFormat,
            err @ PreprocessError::Decode { .. } => UploadError::DecodeError(err),
            err @ PreprocessError::Encode { .. } => UploadError::EncodeError(err),
            PreprocessError::Io(e) => UploadError::Internal(e.to_string()),
        }
    }
}

impl From<ForwardError> for UploadError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::Unreachable(e) => UploadError::BackendUnreachable(e),
            ForwardError::Status { status, body } => UploadError::BackendError { status, body },
            ForwardError::InvalidPart(e) => UploadError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        (self.status_code(), self.client_message()).into_response()
    }
}
