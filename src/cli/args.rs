use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::defaults::*;
use crate::config::AspectRatio;
use crate::model::{InputKind, OutputFormat};

use super::size::parse_target_size;

#[derive(Parser, Debug)]
#[command(name = "shrink-to-target")]
#[command(
    author,
    version,
    about = "Shrink an image or PDF until it fits a target file size"
)]
pub struct Args {
    /// Input image or PDF file path
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output file path (defaults to <input>_resized.jpg or <input>_resized.pdf)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Target size, e.g. "200KB", "1.5MB" or a plain byte count
    #[arg(short, long, value_parser = parse_target_size)]
    pub target: u64,

    /// Input kind (auto-detected from the file header by default)
    #[arg(short, long, value_enum, default_value = "auto")]
    pub kind: KindArg,

    /// Lowest JPEG quality the search may use
    #[arg(long, default_value_t = DEFAULT_MIN_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub min_quality: u8,

    /// Highest JPEG quality the search may use
    #[arg(long, default_value_t = DEFAULT_MAX_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub max_quality: u8,

    /// Quality step for the linear fallback scan
    #[arg(long, default_value_t = DEFAULT_QUALITY_STEP, value_parser = clap::value_parser!(u8).range(1..=50))]
    pub quality_step: u8,

    /// Shrink factor applied per step when quality alone is not enough
    #[arg(long, default_value_t = DEFAULT_SCALE_STEP)]
    pub scale_step: f64,

    /// Smallest scale an image may be shrunk to
    #[arg(long, default_value_t = DEFAULT_SCALE_FLOOR)]
    pub scale_floor: f64,

    /// Reshape images to this aspect ratio first, e.g. "4:3" (distorts, never crops)
    #[arg(long)]
    pub aspect: Option<AspectRatio>,

    /// Round each axis independently when shrinking
    #[arg(long)]
    pub no_lock_aspect: bool,

    /// Page render scale when rasterizing PDFs (1.0 = 72 dpi)
    #[arg(long, default_value_t = DEFAULT_RENDER_SCALE)]
    pub render_scale: f32,

    /// JPEG quality for recompressing embedded PDF images
    #[arg(long, default_value_t = DEFAULT_OPTIMIZE_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub optimize_quality: u8,

    /// Abort if compression takes longer than this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum KindArg {
    /// Detect from the file header
    #[default]
    Auto,
    Image,
    Document,
}

impl KindArg {
    pub fn resolve(self, bytes: &[u8]) -> InputKind {
        match self {
            KindArg::Auto => InputKind::detect(bytes),
            KindArg::Image => InputKind::Image,
            KindArg::Document => InputKind::Document,
        }
    }
}

impl Args {
    /// Get the output path, defaulting to `<stem>_resized.<ext>` next to the input
    pub fn output_path(&self, format: OutputFormat) -> PathBuf {
        if let Some(ref output) = self.output {
            return output.clone();
        }

        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());

        self.input
            .with_file_name(format!("{}_resized.{}", stem, format.extension()))
    }

    pub fn lock_aspect(&self) -> bool {
        !self.no_lock_aspect
    }
}
