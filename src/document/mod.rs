//! Paginated documents (PDF): the optimize pass, the rasterize pass and the
//! pieces they share.

pub mod assemble;
pub mod images;
pub mod optimizer;
pub mod rasterizer;
pub mod render;

#[cfg(test)]
pub(crate) mod fixtures;

pub use assemble::PdfAssembler;
pub use optimizer::{DocumentOptimizer, OptimizedDocument};
pub use rasterizer::{DocumentRasterizer, PageDescriptor};
#[cfg(feature = "pdfium")]
pub use render::PdfiumRenderer;
pub use render::{default_renderer, EmbeddedImageRenderer, PageRenderer, PageSource};
