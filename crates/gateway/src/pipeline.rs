use crate::config::PipelineConfig;
use crate::error::UploadError;
use crate::forwarder::{ForwardResult, Forwarder};
use crate::metrics::UploadMetrics;
use preprocess::{
    EncodedImage, Encoder, ImageKind, NormalizedImage, Normalizer, PreprocessError,
    UploadArtifact,
};
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    Sniffed,
    Normalized,
    Reencoded,
    Forwarded,
    Completed,
    Failed,
}

impl PipelineState {
    /// The only legal successor on the success path.
    pub fn next(&self) -> Option<PipelineState> {
        match self {
            PipelineState::Received => Some(PipelineState::Sniffed),
            PipelineState::Sniffed => Some(PipelineState::Normalized),
            PipelineState::Normalized => Some(PipelineState::Reencoded),
            PipelineState::Reencoded => Some(PipelineState::Forwarded),
            PipelineState::Forwarded => Some(PipelineState::Completed),
            PipelineState::Completed | PipelineState::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Received => "received",
            PipelineState::Sniffed => "sniffed",
            PipelineState::Normalized => "normalized",
            PipelineState::Reencoded => "reencoded",
            PipelineState::Forwarded => "forwarded",
            PipelineState::Completed => "completed",
            PipelineState::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Illegal pipeline transition {from} -> {to}")]
pub struct TransitionError {
    pub from: PipelineState,
    pub to: PipelineState,
}

impl From<TransitionError> for UploadError {
    fn from(err: TransitionError) -> Self {
        UploadError::Internal(err.to_string())
    }
}

/// Per-request state threaded through the stages.
///
/// Owned by a single pipeline run; each stage's output is stored here and the
/// previous stage's output is dropped once it is no longer needed.
#[derive(Debug)]
pub struct RequestContext {
    request_id: Uuid,
    artifact: UploadArtifact,
    normalized: Option<NormalizedImage>,
    encoded: Option<EncodedImage>,
    result: Option<ForwardResult>,
    state: PipelineState,
    failed_at: Option<PipelineState>,
}

impl RequestContext {
    pub fn new(request_id: Uuid, artifact: UploadArtifact) -> Self {
        Self {
            request_id,
            artifact,
            normalized: None,
            encoded: None,
            result: None,
            state: PipelineState::Received,
            failed_at: None,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// State the request was in when it failed.
    pub fn failed_at(&self) -> Option<PipelineState> {
        self.failed_at
    }

    pub fn artifact(&self) -> &UploadArtifact {
        &self.artifact
    }

    pub fn normalized(&self) -> Option<&NormalizedImage> {
        self.normalized.as_ref()
    }

    pub fn encoded(&self) -> Option<&EncodedImage> {
        self.encoded.as_ref()
    }

    /// Move to `to`, which must be the current state's successor.
    pub fn advance(&mut self, to: PipelineState) -> Result<(), TransitionError> {
        if self.state.next() != Some(to) {
            return Err(TransitionError {
                from: self.state,
                to,
            });
        }
        tracing::trace!(from = %self.state, to = %to, "Pipeline transition");
        self.state = to;
        Ok(())
    }

    /// Abort the request. Allowed from any non-terminal state.
    pub fn fail(&mut self) -> Result<(), TransitionError> {
        if self.state.is_terminal() {
            return Err(TransitionError {
                from: self.state,
                to: PipelineState::Failed,
            });
        }
        self.failed_at = Some(self.state);
        self.state = PipelineState::Failed;
        self.normalized = None;
        self.encoded = None;
        Ok(())
    }

    pub fn sniff(&mut self) -> Result<ImageKind, PreprocessError> {
        let kind = self.artifact.sniff()?;
        Ok(kind)
    }

    pub fn set_normalized(&mut self, image: NormalizedImage) -> Result<(), TransitionError> {
        self.advance(PipelineState::Normalized)?;
        self.normalized = Some(image);
        Ok(())
    }

    /// Store the re-encoded image; the raster is no longer needed after this.
    pub fn set_encoded(&mut self, image: EncodedImage) -> Result<(), TransitionError> {
        self.advance(PipelineState::Reencoded)?;
        self.normalized = None;
        self.encoded = Some(image);
        Ok(())
    }

    pub fn take_encoded(&mut self) -> Option<EncodedImage> {
        self.encoded.take()
    }

    pub fn set_forwarded(&mut self, result: ForwardResult) -> Result<(), TransitionError> {
        self.advance(PipelineState::Forwarded)?;
        self.result = Some(result);
        Ok(())
    }

    /// Finish the request and hand back the backend reply.
    pub fn complete(&mut self) -> Result<ForwardResult, TransitionError> {
        let to = PipelineState::Completed;
        let result = match (self.state, self.result.take()) {
            (PipelineState::Forwarded, Some(result)) => result,
            (from, _) => return Err(TransitionError { from, to }),
        };
        self.advance(to)?;
        Ok(result)
    }
}

/// Runs sniff, normalize, re-encode and forward for one upload.
///
/// Immutable after construction and shared across requests behind an `Arc`.
pub struct UploadPipeline {
    config: PipelineConfig,
    normalizer: Normalizer,
    encoder: Encoder,
    forwarder: Forwarder,
    metrics: UploadMetrics,
}

impl UploadPipeline {
    pub fn new(config: PipelineConfig, forwarder: Forwarder) -> Self {
        Self::with_metrics(config, forwarder, UploadMetrics::default())
    }

    pub fn with_metrics(config: PipelineConfig, forwarder: Forwarder, metrics: UploadMetrics) -> Self {
        Self {
            normalizer: Normalizer::new(config.normalize),
            encoder: Encoder::new(config.jpeg_quality),
            config,
            forwarder,
            metrics,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self, artifact: UploadArtifact) -> Result<ForwardResult, UploadError> {
        self.run_with_id(Uuid::new_v4(), artifact).await
    }

    pub async fn run_with_id(
        &self,
        request_id: Uuid,
        artifact: UploadArtifact,
    ) -> Result<ForwardResult, UploadError> {
        let mut ctx = RequestContext::new(request_id, artifact);

        match self.execute(&mut ctx).await {
            Ok(result) => Ok(result),
            Err(err) => {
                let failed_at = ctx.state();
                if let Err(e) = ctx.fail() {
                    tracing::warn!(error = %e, "Pipeline failed after reaching a terminal state");
                }
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    failed_at = %failed_at,
                    kind = err.kind(),
                    "Pipeline aborted"
                );
                Err(err)
            }
        }
    }

    async fn execute(&self, ctx: &mut RequestContext) -> Result<ForwardResult, UploadError> {
        let kind = ctx.sniff()?;
        ctx.advance(PipelineState::Sniffed)?;

        let (normalized, encoded) = self.preprocess(ctx.artifact().clone(), kind).await?;
        ctx.set_normalized(normalized)?;
        ctx.set_encoded(encoded?)?;

        let filename = outbound_filename(ctx.artifact().filename(), kind);
        let encoded = ctx
            .take_encoded()
            .ok_or_else(|| UploadError::Internal("encoded image missing".to_string()))?;

        let started = Instant::now();
        let forwarded = self.forwarder.forward(encoded, &filename).await;
        self.metrics.record_backend(started.elapsed());

        ctx.set_forwarded(forwarded?)?;
        Ok(ctx.complete()?)
    }

    /// Decode, resize and re-encode on the blocking pool.
    ///
    /// A normalize failure is returned directly; an encode failure is
    /// returned inside the tuple so the context can record the normalize
    /// stage first.
    async fn preprocess(
        &self,
        artifact: UploadArtifact,
        kind: ImageKind,
    ) -> Result<(NormalizedImage, Result<EncodedImage, PreprocessError>), UploadError> {
        let normalizer = self.normalizer.clone();
        let encoder = self.encoder;
        let span = tracing::Span::current();

        let joined = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let normalized = normalizer.normalize(artifact.bytes(), kind)?;
            let encoded = encoder.encode(&normalized);
            Ok::<_, PreprocessError>((normalized, encoded))
        })
        .await;

        match joined {
            Ok(result) => Ok(result?),
            Err(e) => Err(UploadError::Internal(format!("preprocess task failed: {}", e))),
        }
    }
}

/// Filename for the backend part: the basename of what the client declared,
/// or `digit.<ext>` when nothing usable was sent.
pub fn outbound_filename(declared: &str, kind: ImageKind) -> String {
    let base = declared
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base == "." || base == ".." {
        format!("digit.{}", kind.extension())
    } else {
        base.to_string()
    }
}
