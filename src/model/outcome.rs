use std::fmt;

use super::EncodedArtifact;

/// Which strategy produced the final output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyPath {
    /// Image encoded at its original dimensions
    QualityOnly,
    /// Image had to be shrunk before it fit (or before giving up)
    DimensionReduced,
    /// Document kept its structure; only embedded images were recompressed
    OptimizeOnly,
    /// Document pages were rasterized and recompressed
    RasterizeFallback,
}

impl fmt::Display for StrategyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyPath::QualityOnly => write!(f, "quality-only"),
            StrategyPath::DimensionReduced => write!(f, "dimension-reduced"),
            StrategyPath::OptimizeOnly => write!(f, "optimize-only"),
            StrategyPath::RasterizeFallback => write!(f, "rasterize-fallback"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    MetTarget,
    /// Strategy space exhausted; the smallest output found is returned
    BestEffortOverTarget,
}

impl OutcomeStatus {
    pub fn from_sizes(achieved: u64, target: u64) -> Self {
        if achieved <= target {
            OutcomeStatus::MetTarget
        } else {
            OutcomeStatus::BestEffortOverTarget
        }
    }

    pub fn met(&self) -> bool {
        matches!(self, OutcomeStatus::MetTarget)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::MetTarget => write!(f, "met-target"),
            OutcomeStatus::BestEffortOverTarget => write!(f, "best-effort-over-target"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Pdf,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Pdf => "pdf",
        }
    }
}

/// Result of one quality search over a single buffer.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Highest-quality candidate within budget, or the lowest-quality
    /// attempt when nothing fit
    pub artifact: EncodedArtifact,
    pub quality: u8,
    /// Number of encoder calls made
    pub attempts: u32,
    pub satisfied: bool,
}

/// Per-page statistics from the rasterize pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageStats {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub bytes: u64,
    /// Share of the image budget this page was given
    pub budget: u64,
    pub satisfied: bool,
}

/// Final result handed back to the caller.
#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    pub bytes: Vec<u8>,
    pub achieved_bytes: u64,
    pub target_bytes: u64,
    pub format: OutputFormat,
    pub path: StrategyPath,
    pub status: OutcomeStatus,
    /// Final encoder quality (image path)
    pub quality: Option<u8>,
    /// Final scale relative to the source (image path)
    pub scale: Option<f64>,
    pub attempts: u32,
    pub pages: Vec<PageStats>,
}

impl CompressionOutcome {
    /// Build an image-path outcome from the artifact that was chosen
    pub fn from_image(
        artifact: EncodedArtifact,
        target_bytes: u64,
        path: StrategyPath,
        scale: f64,
        attempts: u32,
    ) -> Self {
        let quality = artifact.quality();
        let achieved_bytes = artifact.byte_len();
        Self {
            bytes: artifact.into_bytes(),
            achieved_bytes,
            target_bytes,
            format: OutputFormat::Jpeg,
            path,
            status: OutcomeStatus::from_sizes(achieved_bytes, target_bytes),
            quality: Some(quality),
            scale: Some(scale),
            attempts,
            pages: Vec::new(),
        }
    }

    /// Build a document-path outcome
    pub fn from_document(
        bytes: Vec<u8>,
        target_bytes: u64,
        path: StrategyPath,
        attempts: u32,
        pages: Vec<PageStats>,
    ) -> Self {
        let achieved_bytes = bytes.len() as u64;
        Self {
            bytes,
            achieved_bytes,
            target_bytes,
            format: OutputFormat::Pdf,
            path,
            status: OutcomeStatus::from_sizes(achieved_bytes, target_bytes),
            quality: None,
            scale: None,
            attempts,
            pages,
        }
    }
}
