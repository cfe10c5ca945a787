pub mod artifact;
pub mod input;
pub mod outcome;
pub mod raster;

pub use artifact::EncodedArtifact;
pub use input::InputKind;
pub use outcome::{
    CompressionOutcome, OutcomeStatus, OutputFormat, PageStats, SearchResult, StrategyPath,
};
pub use raster::{ChannelLayout, RasterBuffer};
