//! Leaf codecs: the quality-driven encoder and the shrink-only rescaler.

pub mod encoder;
pub mod rescaler;

pub use encoder::{Encoder, JpegEncoder};
pub use rescaler::Rescaler;
