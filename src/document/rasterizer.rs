//! Pass 2: render every page and rebuild the document from JPEG pages.
//!
//! Used when recompressing embedded images was not enough. Pages are handled
//! strictly one at a time; a page's pixels are dropped before the next page
//! renders, so peak memory does not grow with page count.

use crate::codec::Encoder;
use crate::config::TargetSpec;
use crate::engine::budget::{image_budget, BudgetAllocator};
use crate::engine::progress::{CancelToken, NoProgress, Phase, Progress, ProgressSink};
use crate::engine::quality_search::QualitySearch;
use crate::error::CompressError;
use crate::model::{CompressionOutcome, PageStats, RasterBuffer, StrategyPath};

use super::assemble::PdfAssembler;
use super::render::PageRenderer;

/// One rendered page waiting for its encode
#[derive(Debug)]
pub struct PageDescriptor {
    pub index: usize,
    /// Byte share allotted before the page was encoded
    pub budget: u64,
    pub raster: RasterBuffer,
}

pub struct DocumentRasterizer<'a> {
    renderer: &'a dyn PageRenderer,
    encoder: &'a dyn Encoder,
    progress: &'a dyn ProgressSink,
    cancel: Option<&'a CancelToken>,
}

impl<'a> DocumentRasterizer<'a> {
    pub fn new(renderer: &'a dyn PageRenderer, encoder: &'a dyn Encoder) -> Self {
        Self {
            renderer,
            encoder,
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

    pub fn rasterize_and_target(
        &self,
        document: &[u8],
        spec: &TargetSpec,
    ) -> Result<CompressionOutcome, CompressError> {
        let pages = self.renderer.open(document)?;
        let total = pages.page_count();
        if total == 0 {
            return Err(CompressError::InvalidInput(
                "document has no pages".to_string(),
            ));
        }

        let target = spec.target_bytes;
        let mut budget = BudgetAllocator::new(image_budget(target, total), total);
        log::info!(
            "Rasterizing {} pages with {} renderer at scale {} ({} bytes for images)",
            total,
            self.renderer.name(),
            spec.render_scale,
            budget.remaining()
        );

        let search = QualitySearch::new(self.encoder, spec);
        let mut assembler = PdfAssembler::new();
        let mut stats = Vec::with_capacity(total);
        let mut attempts = 0;

        for index in 0..total {
            if let Some(cancel) = self.cancel {
                cancel.check()?;
            }
            self.progress
                .report(Progress::page(Phase::Rasterizing, index + 1, total));

            let page = PageDescriptor {
                index,
                budget: budget.next_share(),
                raster: pages.render_page(index, spec.render_scale)?,
            };
            let result = search.search(&page.raster, page.budget, spec.quality)?;
            let (width, height) = page.raster.dimensions();
            drop(page.raster);

            attempts += result.attempts;
            budget.consume(result.artifact.byte_len());
            log::debug!(
                "Page {}/{}: {}x{} q={} {} bytes (share {}, {})",
                index + 1,
                total,
                width,
                height,
                result.quality,
                result.artifact.byte_len(),
                page.budget,
                if result.satisfied { "fits" } else { "over" }
            );

            stats.push(PageStats {
                index: page.index,
                width,
                height,
                quality: result.quality,
                bytes: result.artifact.byte_len(),
                budget: page.budget,
                satisfied: result.satisfied,
            });
            assembler.add_page(&result.artifact)?;
        }

        let bytes = assembler.finish()?;
        let outcome = CompressionOutcome::from_document(
            bytes,
            target,
            StrategyPath::RasterizeFallback,
            attempts,
            stats,
        );
        if outcome.status.met() {
            log::info!(
                "Rasterized document is {} bytes (target {})",
                outcome.achieved_bytes,
                target
            );
        } else {
            log::warn!(
                "Rasterized document is {} bytes, over the {} byte target",
                outcome.achieved_bytes,
                target
            );
        }
        Ok(outcome)
    }
}
