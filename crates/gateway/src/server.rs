use crate::config::GatewayConfig;
use crate::error::UploadError;
use crate::forwarder::ForwardResult;
use crate::state::AppState;
use anyhow::Context;
use axum::{
    Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::BytesMut;
use preprocess::UploadArtifact;
use std::time::Instant;
use tokio::signal;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::Instrument;
use uuid::Uuid;

/// Multipart field the client sends the image in.
pub const UPLOAD_FIELD: &str = "file";

/// Room for multipart boundaries and part headers on top of the file limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState, config: &GatewayConfig) -> Router {
    let body_limit = state.max_upload_bytes().saturating_add(MULTIPART_OVERHEAD);

    let mut app = Router::new()
        .route("/upload", post(upload_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .route("/health", get(health_handler));

    if let Some(dir) = &config.static_dir {
        tracing::info!(dir = %dir.display(), "Serving static frontend");
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

pub async fn run_server(config: &GatewayConfig, state: AppState) -> anyhow::Result<()> {
    let app = router(state, config);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!("Gateway listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "upload",
        request_id = %request_id,
        filename = tracing::field::Empty,
        bytes = tracing::field::Empty,
    );

    let mut response = handle_upload(state, request_id, multipart)
        .instrument(span)
        .await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn handle_upload(
    state: AppState,
    request_id: Uuid,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let started = Instant::now();

    let result = match read_upload(multipart, state.max_upload_bytes()).await {
        Ok(artifact) => {
            let span = tracing::Span::current();
            span.record("filename", artifact.filename());
            span.record("bytes", artifact.len());
            tracing::debug!("Upload received");

            state.pipeline.run_with_id(request_id, artifact).await
        }
        Err(e) => Err(e),
    };

    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    state.metrics.record_upload(outcome, started.elapsed());

    match result {
        Ok(reply) => {
            tracing::info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                reply_bytes = reply.body.len(),
                "Upload forwarded"
            );
            relay(reply)
        }
        Err(e) => {
            e.log();
            e.into_response()
        }
    }
}

/// Return the backend's body untouched, keeping its content type.
fn relay(reply: ForwardResult) -> Response {
    let mut response = (StatusCode::OK, reply.body).into_response();
    if let Some(content_type) = reply.content_type {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response
}

/// Pull the first `file` field out of the form, enforcing the size limit
/// while streaming. Other fields are skipped.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
    limit: usize,
) -> Result<UploadArtifact, UploadError> {
    let mut multipart =
        multipart.map_err(|e| UploadError::MalformedRequest(e.body_text()))?;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let mut buf = BytesMut::new();

        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
            if buf.len() + chunk.len() > limit {
                return Err(UploadError::PayloadTooLarge { limit });
            }
            buf.extend_from_slice(&chunk);
        }

        return Ok(UploadArtifact::new(buf.freeze(), filename));
    }

    Err(UploadError::MalformedRequest(format!(
        "missing `{}` field",
        UPLOAD_FIELD
    )))
}

fn multipart_error(err: MultipartError, limit: usize) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::PayloadTooLarge { limit }
    } else {
        UploadError::MalformedRequest(err.body_text())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
