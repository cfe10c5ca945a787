//! Entry point for one compression request.

use crate::codec::{Encoder, JpegEncoder, Rescaler};
use crate::config::TargetSpec;
use crate::document::{
    default_renderer, DocumentOptimizer, DocumentRasterizer, OptimizedDocument, PageRenderer,
};
use crate::error::CompressError;
use crate::model::{CompressionOutcome, InputKind, RasterBuffer, StrategyPath};

use super::image_targeter::ImageSizeTargeter;
use super::progress::{CancelToken, NoProgress, Phase, Progress, ProgressSink};

/// Where a document request stands. Transitions only ever look at whether
/// the last pass came in at or under the target.
enum DocumentState {
    Optimizing,
    Rasterizing(OptimizedDocument),
    Done(CompressionOutcome),
}

/// Routes images and documents to the right strategy.
///
/// Holds no per-request state; one orchestrator can serve any number of
/// sequential `run` calls.
pub struct SizeTargetOrchestrator {
    encoder: Box<dyn Encoder>,
    renderer: Option<Box<dyn PageRenderer>>,
    progress: Box<dyn ProgressSink>,
    cancel: CancelToken,
}

impl Default for SizeTargetOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl SizeTargetOrchestrator {
    /// JPEG encoder, best available renderer, no progress reporting
    pub fn new() -> Self {
        Self {
            encoder: Box::new(JpegEncoder::new()),
            renderer: Some(default_renderer()),
            progress: Box::new(NoProgress),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_encoder(mut self, encoder: impl Encoder + 'static) -> Self {
        self.encoder = Box::new(encoder);
        self
    }

    pub fn with_renderer(mut self, renderer: impl PageRenderer + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Disable the rasterize pass; documents only get the optimize pass.
    pub fn without_renderer(mut self) -> Self {
        self.renderer = None;
        self
    }

    pub fn with_progress(mut self, progress: impl ProgressSink + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle to cancel runs on this orchestrator from another thread
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Compress `input` to at most `spec.target_bytes`, best effort.
    ///
    /// The spec is validated before any decode, encode or render call.
    pub fn run(
        &self,
        input: &[u8],
        kind: InputKind,
        spec: &TargetSpec,
    ) -> Result<CompressionOutcome, CompressError> {
        spec.validate()?;
        if input.is_empty() {
            return Err(CompressError::InvalidInput("input is empty".to_string()));
        }

        log::info!(
            "Compressing {} {} bytes to at most {} bytes",
            kind,
            input.len(),
            spec.target_bytes
        );

        let outcome = match kind {
            InputKind::Image => self.run_image(input, spec)?,
            InputKind::Document => self.run_document(input, spec)?,
        };

        log::info!(
            "Done: {} bytes via {} ({})",
            outcome.achieved_bytes,
            outcome.path,
            outcome.status
        );
        self.progress.report(Progress::phase(Phase::Done));
        Ok(outcome)
    }

    fn run_image(
        &self,
        input: &[u8],
        spec: &TargetSpec,
    ) -> Result<CompressionOutcome, CompressError> {
        let buffer = RasterBuffer::decode(input)?;
        ImageSizeTargeter::new(self.encoder.as_ref(), Rescaler::new(spec.resize_filter))
            .with_progress(self.progress.as_ref())
            .with_cancel_token(&self.cancel)
            .target_image(buffer, spec)
    }

    fn run_document(
        &self,
        input: &[u8],
        spec: &TargetSpec,
    ) -> Result<CompressionOutcome, CompressError> {
        let target = spec.target_bytes;
        let mut state = DocumentState::Optimizing;

        loop {
            state = match state {
                DocumentState::Optimizing => {
                    self.progress.report(Progress::phase(Phase::Optimizing));
                    let optimized = DocumentOptimizer::new(self.encoder.as_ref())
                        .optimize(input, spec.optimize_quality)?;

                    if optimized.achieved_bytes <= target {
                        DocumentState::Done(optimize_outcome(optimized, target))
                    } else if self.renderer.is_none() {
                        log::warn!(
                            "Optimized document is {} bytes and no renderer is configured",
                            optimized.achieved_bytes
                        );
                        DocumentState::Done(optimize_outcome(optimized, target))
                    } else {
                        log::info!(
                            "Optimized document is {} bytes, over target; rasterizing",
                            optimized.achieved_bytes
                        );
                        DocumentState::Rasterizing(optimized)
                    }
                }
                DocumentState::Rasterizing(optimized) => {
                    let Some(renderer) = self.renderer.as_deref() else {
                        return Ok(optimize_outcome(optimized, target));
                    };
                    self.cancel.check()?;

                    let mut rasterized = DocumentRasterizer::new(renderer, self.encoder.as_ref())
                        .with_progress(self.progress.as_ref())
                        .with_cancel_token(&self.cancel)
                        .rasterize_and_target(input, spec)?;

                    if rasterized.status.met()
                        || rasterized.achieved_bytes < optimized.achieved_bytes
                    {
                        rasterized.attempts += optimized.attempts;
                        DocumentState::Done(rasterized)
                    } else {
                        log::warn!(
                            "Rasterized output ({} bytes) is no smaller than optimized ({} bytes)",
                            rasterized.achieved_bytes,
                            optimized.achieved_bytes
                        );
                        let attempts = rasterized.attempts;
                        let mut outcome = optimize_outcome(optimized, target);
                        outcome.attempts += attempts;
                        DocumentState::Done(outcome)
                    }
                }
                DocumentState::Done(outcome) => return Ok(outcome),
            };
        }
    }
}

fn optimize_outcome(optimized: OptimizedDocument, target: u64) -> CompressionOutcome {
    CompressionOutcome::from_document(
        optimized.bytes,
        target,
        StrategyPath::OptimizeOnly,
        optimized.attempts,
        Vec::new(),
    )
}
