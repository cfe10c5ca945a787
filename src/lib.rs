pub mod cli;
pub mod codec;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod model;

pub use codec::{Encoder, JpegEncoder, Rescaler};
pub use config::{AspectRatio, QualityBounds, TargetSpec};
pub use document::{EmbeddedImageRenderer, PageRenderer};
pub use engine::{CancelToken, Phase, Progress, ProgressSink, SizeTargetOrchestrator};
pub use error::{CompressError, ConfigError};
pub use model::{CompressionOutcome, InputKind, OutcomeStatus, OutputFormat, StrategyPath};

/// High-level API: shrink an image or PDF to at most `spec.target_bytes`.
///
/// This is the recommended entry point for library consumers. It uses the
/// JPEG encoder and the best page renderer this build offers. Build a
/// [`SizeTargetOrchestrator`] directly for progress reporting, cancellation
/// or a custom encoder.
///
/// Missing the target is not an error: check `outcome.status`.
///
/// # Example
///
/// ```no_run
/// use shrink_to_target::{compress_to_target, InputKind, TargetSpec};
///
/// let photo = std::fs::read("holiday.png").unwrap();
/// let spec = TargetSpec::new(200 * 1024);
///
/// let outcome = compress_to_target(&photo, InputKind::detect(&photo), &spec).unwrap();
/// if !outcome.status.met() {
///     eprintln!("best effort: {} bytes", outcome.achieved_bytes);
/// }
///
/// std::fs::write("holiday_resized.jpg", &outcome.bytes).unwrap();
/// ```
pub fn compress_to_target(
    input: &[u8],
    kind: InputKind,
    spec: &TargetSpec,
) -> Result<CompressionOutcome, CompressError> {
    SizeTargetOrchestrator::new().run(input, kind, spec)
}
