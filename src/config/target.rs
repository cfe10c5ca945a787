use std::fmt;
use std::str::FromStr;

use image::imageops::FilterType;

use crate::cli::Args;
use crate::error::{CompressError, ConfigError};

use super::defaults::*;

/// Inclusive quality window for the search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityBounds {
    pub low: u8,
    pub high: u8,
}

impl QualityBounds {
    pub fn new(low: u8, high: u8) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, quality: u8) -> bool {
        (self.low..=self.high).contains(&quality)
    }
}

impl Default for QualityBounds {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_QUALITY, DEFAULT_MAX_QUALITY)
    }
}

/// Desired width:height ratio for the reshape step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_f64(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = ConfigError;

    /// Accepts "16:9", "16x9" or "16/9"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split([':', 'x', 'X', '/']).collect();
        if parts.len() != 2 {
            return Err(ConfigError::InvalidAspectRatio(format!(
                "expected W:H, got '{}'",
                s
            )));
        }

        let width: u32 = parts[0]
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidAspectRatio(format!("invalid width: {}", parts[0])))?;
        let height: u32 = parts[1].trim().parse().map_err(|_| {
            ConfigError::InvalidAspectRatio(format!("invalid height: {}", parts[1]))
        })?;

        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidAspectRatio(format!(
                "both sides must be positive, got '{}'",
                s
            )));
        }

        Ok(Self { width, height })
    }
}

/// Everything one compression request needs to know.
///
/// Built once per request and passed by reference; nothing in the engine
/// keeps configuration in global state.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    /// Maximum acceptable output size in bytes
    pub target_bytes: u64,
    pub quality: QualityBounds,
    /// Step for the linear scan when the binary search hits its iteration cap
    pub quality_step: u8,
    pub max_search_iterations: u32,
    /// How many untried qualities above the best candidate get probed
    pub neighbor_probe: u8,
    /// Multiplicative shrink per escalation step, in (0, 1)
    pub scale_step: f64,
    /// Smallest scale the image path will try, in (0, 1]
    pub scale_floor: f64,
    pub lock_aspect: bool,
    /// Reshape images to this ratio before searching
    pub aspect_ratio: Option<AspectRatio>,
    /// Page render scale for the rasterize pass (1.0 = 72 dpi)
    pub render_scale: f32,
    /// Fixed quality for the non-destructive optimize pass
    pub optimize_quality: u8,
    pub resize_filter: FilterType,
}

impl TargetSpec {
    pub fn new(target_bytes: u64) -> Self {
        Self {
            target_bytes,
            quality: QualityBounds::default(),
            quality_step: DEFAULT_QUALITY_STEP,
            max_search_iterations: DEFAULT_MAX_SEARCH_ITERATIONS,
            neighbor_probe: DEFAULT_NEIGHBOR_PROBE,
            scale_step: DEFAULT_SCALE_STEP,
            scale_floor: DEFAULT_SCALE_FLOOR,
            lock_aspect: true,
            aspect_ratio: None,
            render_scale: DEFAULT_RENDER_SCALE,
            optimize_quality: DEFAULT_OPTIMIZE_QUALITY,
            resize_filter: DEFAULT_RESIZE_FILTER,
        }
    }

    /// Create a spec from CLI arguments
    pub fn from_args(args: &Args) -> Self {
        Self {
            quality: QualityBounds::new(args.min_quality, args.max_quality),
            quality_step: args.quality_step,
            scale_step: args.scale_step,
            scale_floor: args.scale_floor,
            lock_aspect: args.lock_aspect(),
            aspect_ratio: args.aspect,
            render_scale: args.render_scale,
            optimize_quality: args.optimize_quality,
            ..Self::new(args.target)
        }
    }

    pub fn with_quality_bounds(mut self, low: u8, high: u8) -> Self {
        self.quality = QualityBounds::new(low, high);
        self
    }

    pub fn with_quality_step(mut self, step: u8) -> Self {
        self.quality_step = step;
        self
    }

    pub fn with_max_search_iterations(mut self, iterations: u32) -> Self {
        self.max_search_iterations = iterations;
        self
    }

    pub fn with_neighbor_probe(mut self, probe: u8) -> Self {
        self.neighbor_probe = probe;
        self
    }

    pub fn with_scale_step(mut self, step: f64) -> Self {
        self.scale_step = step;
        self
    }

    pub fn with_scale_floor(mut self, floor: f64) -> Self {
        self.scale_floor = floor;
        self
    }

    pub fn with_lock_aspect(mut self, lock: bool) -> Self {
        self.lock_aspect = lock;
        self
    }

    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = Some(ratio);
        self
    }

    pub fn with_render_scale(mut self, scale: f32) -> Self {
        self.render_scale = scale;
        self
    }

    pub fn with_optimize_quality(mut self, quality: u8) -> Self {
        self.optimize_quality = quality;
        self
    }

    pub fn with_resize_filter(mut self, filter: FilterType) -> Self {
        self.resize_filter = filter;
        self
    }

    /// Reject configurations the engine cannot run with.
    ///
    /// Called before any encode or render work starts.
    pub fn validate(&self) -> Result<(), CompressError> {
        let invalid = |msg: String| Err(CompressError::InvalidInput(msg));

        if self.target_bytes == 0 {
            return invalid("target size must be greater than zero".to_string());
        }

        let QualityBounds { low, high } = self.quality;
        if low < MIN_CODEC_QUALITY || high > MAX_CODEC_QUALITY {
            return invalid(format!(
                "quality bounds {}..={} must lie within {}..={}",
                low, high, MIN_CODEC_QUALITY, MAX_CODEC_QUALITY
            ));
        }
        if low >= high {
            return invalid(format!(
                "lower quality bound {} must be below upper bound {}",
                low, high
            ));
        }

        if self.quality_step == 0 {
            return invalid("quality step must be at least 1".to_string());
        }
        if self.max_search_iterations == 0 {
            return invalid("search needs at least one iteration".to_string());
        }

        if !(self.scale_step > 0.0 && self.scale_step < 1.0) {
            return invalid(format!(
                "scale step must be in (0, 1), got {}",
                self.scale_step
            ));
        }
        if !(self.scale_floor > 0.0 && self.scale_floor <= 1.0) {
            return invalid(format!(
                "scale floor must be in (0, 1], got {}",
                self.scale_floor
            ));
        }

        if !(self.render_scale > 0.0 && self.render_scale <= MAX_RENDER_SCALE) {
            return invalid(format!(
                "render scale must be in (0, {}], got {}",
                MAX_RENDER_SCALE, self.render_scale
            ));
        }

        if !(MIN_CODEC_QUALITY..=MAX_CODEC_QUALITY).contains(&self.optimize_quality) {
            return invalid(format!(
                "optimize quality {} outside {}..={}",
                self.optimize_quality, MIN_CODEC_QUALITY, MAX_CODEC_QUALITY
            ));
        }

        if let Some(ratio) = self.aspect_ratio {
            if ratio.width == 0 || ratio.height == 0 {
                return invalid(format!("aspect ratio {} has a zero side", ratio));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(TargetSpec::new(200 * 1024).validate().is_ok());
    }

    #[test]
    fn test_zero_target_rejected() {
        let err = TargetSpec::new(0).validate().unwrap_err();
        assert!(matches!(err, CompressError::InvalidInput(_)));
    }

    #[test]
    fn test_misordered_bounds_rejected() {
        let spec = TargetSpec::new(1000).with_quality_bounds(90, 40);
        assert!(spec.validate().is_err());

        let spec = TargetSpec::new(1000).with_quality_bounds(50, 50);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_out_of_range_bounds_rejected() {
        let spec = TargetSpec::new(1000).with_quality_bounds(0, 90);
        assert!(spec.validate().is_err());

        let spec = TargetSpec::new(1000).with_quality_bounds(10, 101);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_scale_parameters_checked() {
        assert!(TargetSpec::new(1000).with_scale_step(1.0).validate().is_err());
        assert!(TargetSpec::new(1000).with_scale_step(0.0).validate().is_err());
        assert!(TargetSpec::new(1000).with_scale_floor(0.0).validate().is_err());
        assert!(TargetSpec::new(1000).with_scale_floor(1.0).validate().is_ok());
        assert!(TargetSpec::new(1000).with_render_scale(0.0).validate().is_err());
        assert!(TargetSpec::new(1000)
            .with_scale_step(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_parse_aspect_ratio() {
        assert_eq!("4:3".parse::<AspectRatio>().unwrap(), AspectRatio::new(4, 3));
        assert_eq!("16x9".parse::<AspectRatio>().unwrap(), AspectRatio::new(16, 9));
        assert_eq!(" 1 / 1 ".parse::<AspectRatio>().unwrap(), AspectRatio::new(1, 1));
    }

    #[test]
    fn test_parse_aspect_ratio_rejects_garbage() {
        assert!("4:0".parse::<AspectRatio>().is_err());
        assert!("wide".parse::<AspectRatio>().is_err());
        assert!("1:2:3".parse::<AspectRatio>().is_err());
    }
}
