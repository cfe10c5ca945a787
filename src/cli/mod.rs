pub mod args;
pub mod size;

pub use args::{Args, KindArg};
pub use size::{format_size, parse_size};
