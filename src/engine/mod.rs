//! The size-targeting engine: quality search, image escalation and the
//! orchestrator that routes a request through them.

pub mod budget;
pub mod image_targeter;
pub mod orchestrator;
pub mod progress;
pub mod quality_search;

pub use budget::BudgetAllocator;
pub use image_targeter::ImageSizeTargeter;
pub use orchestrator::SizeTargetOrchestrator;
pub use progress::{CancelToken, NoProgress, Phase, Progress, ProgressSink};
pub use quality_search::QualitySearch;
