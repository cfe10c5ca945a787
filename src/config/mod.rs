pub mod defaults;
pub mod target;

pub use target::{AspectRatio, QualityBounds, TargetSpec};
