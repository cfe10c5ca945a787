//! Single-image path: quality first, then dimensions.

use crate::codec::{Encoder, Rescaler};
use crate::config::{AspectRatio, TargetSpec};
use crate::error::CompressError;
use crate::model::{CompressionOutcome, EncodedArtifact, RasterBuffer, StrategyPath};

use super::progress::{CancelToken, NoProgress, Phase, Progress, ProgressSink};
use super::quality_search::QualitySearch;

/// Slack for comparing accumulated scale products against the floor
const SCALE_EPSILON: f64 = 1e-9;

/// Fits one raster image under a byte budget.
///
/// Quality is spent before resolution: the image is only shrunk once the
/// whole quality window has failed at the current size.
pub struct ImageSizeTargeter<'a> {
    encoder: &'a dyn Encoder,
    rescaler: Rescaler,
    progress: &'a dyn ProgressSink,
    cancel: Option<&'a CancelToken>,
}

/// Smallest artifact seen so far and the scale it was produced at
struct Smallest {
    artifact: EncodedArtifact,
    scale: f64,
}

impl Smallest {
    fn offer(&mut self, artifact: EncodedArtifact, scale: f64) {
        if artifact.byte_len() < self.artifact.byte_len() {
            self.artifact = artifact;
            self.scale = scale;
        }
    }
}

impl<'a> ImageSizeTargeter<'a> {
    pub fn new(encoder: &'a dyn Encoder, rescaler: Rescaler) -> Self {
        Self {
            encoder,
            rescaler,
            progress: &NoProgress,
            cancel: None,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel_token(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn target_image(
        &self,
        buffer: RasterBuffer,
        spec: &TargetSpec,
    ) -> Result<CompressionOutcome, CompressError> {
        let target = spec.target_bytes;
        let source = match spec.aspect_ratio {
            Some(ratio) => self.reshape(buffer, ratio)?,
            None => buffer,
        };

        log::info!(
            "Targeting {} bytes for {}x{} {} image",
            target,
            source.width(),
            source.height(),
            source.layout()
        );
        self.progress.report(Progress::phase(Phase::Searching));

        // Fast exit: the best quality already fits
        let first = self.encoder.encode(&source, spec.quality.high)?;
        let mut attempts = 1;
        if first.byte_len() <= target {
            log::info!(
                "Fits at maximum quality {} ({} bytes)",
                spec.quality.high,
                first.byte_len()
            );
            return Ok(CompressionOutcome::from_image(
                first,
                target,
                StrategyPath::QualityOnly,
                1.0,
                attempts,
            ));
        }

        let search = QualitySearch::new(self.encoder, spec);
        let result =
            search.search_with_known(&source, target, spec.quality, Some(first.clone()))?;
        attempts += result.attempts;
        if result.satisfied {
            log::info!(
                "Quality {} meets target ({} bytes)",
                result.quality,
                result.artifact.byte_len()
            );
            return Ok(CompressionOutcome::from_image(
                result.artifact,
                target,
                StrategyPath::QualityOnly,
                1.0,
                attempts,
            ));
        }

        let mut smallest = Smallest {
            artifact: first,
            scale: 1.0,
        };
        smallest.offer(result.artifact, 1.0);

        log::info!(
            "Quality window {}..={} exhausted, reducing dimensions",
            spec.quality.low,
            spec.quality.high
        );

        let mut scale = 1.0;
        let mut last_dims = source.dimensions();
        loop {
            if let Some(cancel) = self.cancel {
                cancel.check()?;
            }

            let next = scale * spec.scale_step;
            if next + SCALE_EPSILON < spec.scale_floor {
                log::debug!(
                    "Next scale {:.3} is below floor {:.3}",
                    next,
                    spec.scale_floor
                );
                break;
            }

            let (width, height) = match self.rescaler.target_dimensions(
                source.width(),
                source.height(),
                next,
                spec.lock_aspect,
            ) {
                Ok(dims) => dims,
                Err(CompressError::Rescale(msg)) => {
                    log::debug!("Stopping escalation: {}", msg);
                    break;
                }
                Err(e) => return Err(e),
            };
            scale = next;
            if (width, height) == last_dims {
                log::debug!("Scale {:.3} rounds to the same {}x{}, skipping", scale, width, height);
                continue;
            }
            last_dims = (width, height);

            self.progress.report(Progress::phase(Phase::Rescaling));
            let scaled = self.rescaler.resize_to(&source, width, height)?;
            log::debug!("Scale {:.3}: searching at {}x{}", scale, width, height);

            let result = search.search(&scaled, target, spec.quality)?;
            attempts += result.attempts;
            if result.satisfied {
                log::info!(
                    "Quality {} at scale {:.3} ({}x{}) meets target ({} bytes)",
                    result.quality,
                    scale,
                    width,
                    height,
                    result.artifact.byte_len()
                );
                return Ok(CompressionOutcome::from_image(
                    result.artifact,
                    target,
                    StrategyPath::DimensionReduced,
                    scale,
                    attempts,
                ));
            }
            smallest.offer(result.artifact, scale);
        }

        let path = if scale < 1.0 {
            StrategyPath::DimensionReduced
        } else {
            StrategyPath::QualityOnly
        };
        log::warn!(
            "Could not reach {} bytes; smallest result is {} bytes (quality {}, scale {:.3})",
            target,
            smallest.artifact.byte_len(),
            smallest.artifact.quality(),
            smallest.scale
        );
        Ok(CompressionOutcome::from_image(
            smallest.artifact,
            target,
            path,
            smallest.scale,
            attempts,
        ))
    }

    /// Distort to `ratio` by shrinking whichever axis is too long.
    fn reshape(
        &self,
        buffer: RasterBuffer,
        ratio: AspectRatio,
    ) -> Result<RasterBuffer, CompressError> {
        let (width, height) = buffer.dimensions();
        let (new_width, new_height) = reshape_dimensions(width, height, ratio);
        if (new_width, new_height) == (width, height) {
            return Ok(buffer);
        }

        log::debug!(
            "Reshaping {}x{} to {} as {}x{}",
            width,
            height,
            ratio,
            new_width,
            new_height
        );
        self.rescaler.resize_to(&buffer, new_width, new_height)
    }
}

fn reshape_dimensions(width: u32, height: u32, ratio: AspectRatio) -> (u32, u32) {
    let desired = ratio.as_f64();
    let current = width as f64 / height as f64;
    if current > desired {
        let w = (height as f64 * desired).round() as u32;
        (w.clamp(1, width), height)
    } else {
        let h = (width as f64 / desired).round() as u32;
        (width, h.clamp(1, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JpegEncoder;
    use crate::model::ChannelLayout;
    use std::sync::Mutex;

    /// Output size proportional to pixel count and quality
    struct AreaEncoder {
        bytes_per_pixel_at_100: f64,
        widths: Mutex<Vec<u32>>,
        qualities: Mutex<Vec<u8>>,
    }

    impl AreaEncoder {
        fn new(bytes_per_pixel_at_100: f64) -> Self {
            Self {
                bytes_per_pixel_at_100,
                widths: Mutex::new(Vec::new()),
                qualities: Mutex::new(Vec::new()),
            }
        }

        fn widths(&self) -> Vec<u32> {
            self.widths.lock().unwrap().clone()
        }

        fn qualities(&self) -> Vec<u8> {
            self.qualities.lock().unwrap().clone()
        }
    }

    impl Encoder for AreaEncoder {
        fn encode(
            &self,
            buffer: &RasterBuffer,
            quality: u8,
        ) -> Result<EncodedArtifact, CompressError> {
            self.widths.lock().unwrap().push(buffer.width());
            self.qualities.lock().unwrap().push(quality);
            let len = buffer.pixel_count() as f64 * self.bytes_per_pixel_at_100 * quality as f64
                / 100.0;
            Ok(EncodedArtifact::new(
                vec![0; len as usize],
                quality,
                buffer.width(),
                buffer.height(),
                buffer.layout(),
            ))
        }
    }

    fn gray(width: u32, height: u32) -> RasterBuffer {
        let pixels = (0..width * height).map(|i| (i % 251) as u8).collect();
        RasterBuffer::new(width, height, ChannelLayout::Gray, pixels).unwrap()
    }

    #[test]
    fn test_generous_target_returns_max_quality_encoding() {
        let buffer = gray(64, 48);
        let unmodified = JpegEncoder.encode(&buffer, 95).unwrap();

        let enc = JpegEncoder;
        let targeter = ImageSizeTargeter::new(&enc, Rescaler::default());
        let spec = TargetSpec::new(unmodified.byte_len());
        let outcome = targeter.target_image(buffer, &spec).unwrap();

        assert_eq!(outcome.bytes, unmodified.bytes());
        assert_eq!(outcome.quality, Some(95));
        assert_eq!(outcome.path, StrategyPath::QualityOnly);
        assert!(outcome.status.met());
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn test_quality_only_scenario() {
        // ~500 KB at q=95 against a 200 KB budget
        let enc = AreaEncoder::new(500.0 * 1024.0 / (1000.0 * 0.95));
        let targeter = ImageSizeTargeter::new(&enc, Rescaler::default());
        let spec = TargetSpec::new(200 * 1024).with_quality_bounds(30, 95);
        let outcome = targeter.target_image(gray(100, 10), &spec).unwrap();

        assert_eq!(outcome.path, StrategyPath::QualityOnly);
        assert!(outcome.status.met());
        assert!(outcome.achieved_bytes <= 200 * 1024);
        let q = outcome.quality.unwrap();
        assert!((30..=95).contains(&q));
        // One quality step up would no longer fit
        let above = enc.encode(&gray(100, 10), q + 1).unwrap();
        assert!(above.byte_len() > 200 * 1024);
    }

    #[test]
    fn test_escalates_to_smaller_dimensions() {
        // 100x100 at q=30 is 3000 bytes; 81x81 at q=30 is 1968
        let enc = AreaEncoder::new(1.0);
        let targeter = ImageSizeTargeter::new(&enc, Rescaler::default());
        let spec = TargetSpec::new(2_000);
        let outcome = targeter.target_image(gray(100, 100), &spec).unwrap();

        assert_eq!(outcome.path, StrategyPath::DimensionReduced);
        assert!(outcome.status.met());
        assert!(outcome.achieved_bytes <= 2_000);
        assert!((outcome.scale.unwrap() - 0.81).abs() < 1e-9);
        assert_eq!(enc.widths().last(), Some(&81));
    }

    #[test]
    fn test_escalation_walks_down_to_floor() {
        let enc = AreaEncoder::new(1000.0);
        let targeter = ImageSizeTargeter::new(&enc, Rescaler::default());
        let spec = TargetSpec::new(10).with_scale_floor(0.5);
        let outcome = targeter.target_image(gray(100, 100), &spec).unwrap();

        assert!(!outcome.status.met());
        assert_eq!(outcome.path, StrategyPath::DimensionReduced);

        let mut widths = enc.widths();
        widths.dedup();
        // 0.9, 0.81, 0.729, 0.656, 0.590, 0.531; 0.478 is below the floor
        assert_eq!(widths, vec![100, 90, 81, 72, 65, 59, 53]);
        // Smallest artifact across every attempt
        assert!((outcome.scale.unwrap() - 0.9f64.powi(6)).abs() < 1e-9);
        assert_eq!(outcome.quality, Some(30));
    }

    #[test]
    fn test_escalation_stops_before_collapsing() {
        let enc = AreaEncoder::new(1000.0);
        let targeter = ImageSizeTargeter::new(&enc, Rescaler::default());
        let spec = TargetSpec::new(1).with_scale_floor(0.001);
        let outcome = targeter.target_image(gray(3, 3), &spec).unwrap();

        assert!(!outcome.status.met());
        assert!(enc.widths().iter().all(|&w| w >= 1));
        assert_eq!(enc.widths().last(), Some(&1));
    }

    #[test]
    fn test_max_quality_is_encoded_once() {
        // 10 bytes per quality point: 94 fits, 95 does not
        let enc = AreaEncoder::new(1.0);
        let targeter = ImageSizeTargeter::new(&enc, Rescaler::default());
        let outcome = targeter
            .target_image(gray(100, 10), &TargetSpec::new(945))
            .unwrap();

        assert_eq!(outcome.quality, Some(94));
        assert_eq!(enc.qualities().iter().filter(|&&q| q == 95).count(), 1);
        assert_eq!(outcome.attempts as usize, enc.qualities().len());
    }

    #[test]
    fn test_scale_steps_with_unchanged_dimensions_are_skipped() {
        let enc = AreaEncoder::new(1000.0);
        let targeter = ImageSizeTargeter::new(&enc, Rescaler::default());
        let spec = TargetSpec::new(1)
            .with_scale_step(0.97)
            .with_scale_floor(0.5);
        let outcome = targeter.target_image(gray(10, 10), &spec).unwrap();
        assert!(!outcome.status.met());

        let widths = enc.widths();
        let mut distinct = widths.clone();
        distinct.dedup();
        let mut sorted = distinct.clone();
        sorted.sort_unstable();
        sorted.dedup();
        // Each width is searched in one contiguous run, never revisited
        assert_eq!(sorted.len(), distinct.len());
        assert!(distinct.len() >= 3);

        // Every search costs the same here, plus the fast exit at full size
        let count = |w: u32| widths.iter().filter(|&&x| x == w).count();
        let per_search = count(distinct[1]);
        assert_eq!(count(10), per_search + 1);
        assert!(distinct[1..].iter().all(|&w| count(w) == per_search));
    }

    #[test]
    fn test_cancel_between_scale_steps() {
        let enc = AreaEncoder::new(1000.0);
        let cancel = CancelToken::new();
        cancel.cancel();
        let targeter =
            ImageSizeTargeter::new(&enc, Rescaler::default()).with_cancel_token(&cancel);
        let err = targeter
            .target_image(gray(50, 50), &TargetSpec::new(10))
            .unwrap_err();
        assert!(matches!(err, CompressError::Cancelled));
    }

    #[test]
    fn test_reshape_shrinks_one_axis() {
        let ratio = AspectRatio::new(1, 1);
        assert_eq!(reshape_dimensions(200, 100, ratio), (100, 100));
        assert_eq!(reshape_dimensions(100, 200, ratio), (100, 100));
        assert_eq!(
            reshape_dimensions(400, 400, AspectRatio::new(16, 9)),
            (400, 225)
        );
        assert_eq!(reshape_dimensions(160, 90, AspectRatio::new(16, 9)), (160, 90));
    }

    #[test]
    fn test_aspect_ratio_applied_before_search() {
        let enc = AreaEncoder::new(0.01);
        let targeter = ImageSizeTargeter::new(&enc, Rescaler::default());
        let spec = TargetSpec::new(1_000_000).with_aspect_ratio(AspectRatio::new(1, 1));
        let outcome = targeter.target_image(gray(80, 40), &spec).unwrap();

        assert!(outcome.status.met());
        assert_eq!(enc.widths(), vec![40]);
    }
}
