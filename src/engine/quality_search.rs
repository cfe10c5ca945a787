//! Find the highest encoder quality whose output fits a byte budget.
//!
//! The search assumes size grows with quality but does not trust it: every
//! measured encoding is kept, the loop is capped, and a few untried
//! qualities above the winner are probed afterwards. Plateaus and small
//! non-monotonic bumps in the codec therefore cost a few extra encodes
//! rather than a wrong answer.

use std::collections::BTreeMap;

use crate::codec::Encoder;
use crate::config::{QualityBounds, TargetSpec};
use crate::error::CompressError;
use crate::model::{EncodedArtifact, RasterBuffer, SearchResult};

pub struct QualitySearch<'a> {
    encoder: &'a dyn Encoder,
    quality_step: u8,
    max_iterations: u32,
    neighbor_probe: u8,
}

/// Every encoding measured during one search, keyed by quality
struct Attempts<'a> {
    encoder: &'a dyn Encoder,
    buffer: &'a RasterBuffer,
    target_bytes: u64,
    by_quality: BTreeMap<u8, EncodedArtifact>,
    encodes: u32,
}

impl<'a> Attempts<'a> {
    /// Encode at `quality` unless it was already measured; returns whether it fits
    fn try_quality(&mut self, quality: u8) -> Result<bool, CompressError> {
        if let Some(artifact) = self.by_quality.get(&quality) {
            return Ok(artifact.byte_len() <= self.target_bytes);
        }

        let artifact = self.encoder.encode(self.buffer, quality)?;
        self.encodes += 1;
        let fits = artifact.byte_len() <= self.target_bytes;
        log::debug!(
            "  q={:3} -> {} bytes ({})",
            quality,
            artifact.byte_len(),
            if fits { "fits" } else { "over" }
        );
        self.by_quality.insert(quality, artifact);
        Ok(fits)
    }

    fn contains(&self, quality: u8) -> bool {
        self.by_quality.contains_key(&quality)
    }
}

impl<'a> QualitySearch<'a> {
    pub fn new(encoder: &'a dyn Encoder, spec: &TargetSpec) -> Self {
        Self {
            encoder,
            quality_step: spec.quality_step.max(1),
            max_iterations: spec.max_search_iterations.max(1),
            neighbor_probe: spec.neighbor_probe,
        }
    }

    /// Search `bounds` for the highest quality at or under `target_bytes`.
    ///
    /// When nothing fits, the lowest-quality encoding is returned with
    /// `satisfied == false`; the caller decides whether to escalate.
    pub fn search(
        &self,
        buffer: &RasterBuffer,
        target_bytes: u64,
        bounds: QualityBounds,
    ) -> Result<SearchResult, CompressError> {
        self.search_with_known(buffer, target_bytes, bounds, None)
    }

    /// Like [`search`](Self::search), reusing an encoding of `buffer` the
    /// caller already has. It is never re-encoded and does not count as an
    /// attempt.
    pub fn search_with_known(
        &self,
        buffer: &RasterBuffer,
        target_bytes: u64,
        bounds: QualityBounds,
        known: Option<EncodedArtifact>,
    ) -> Result<SearchResult, CompressError> {
        if bounds.low == 0 || bounds.low > bounds.high {
            return Err(CompressError::InvalidInput(format!(
                "invalid quality window {}..={}",
                bounds.low, bounds.high
            )));
        }

        let mut attempts = Attempts {
            encoder: self.encoder,
            buffer,
            target_bytes,
            by_quality: BTreeMap::new(),
            encodes: 0,
        };
        if let Some(artifact) = known.filter(|a| bounds.contains(a.quality())) {
            attempts.by_quality.insert(artifact.quality(), artifact);
        }
        let mut best: Option<u8> = None;

        // Binary search; `low..=high` is the still-undecided window
        let mut low = bounds.low;
        let mut high = bounds.high;
        let mut iterations = 0;
        while low <= high && iterations < self.max_iterations {
            iterations += 1;
            let mid = low + (high - low) / 2;
            if attempts.try_quality(mid)? {
                best = best.max(Some(mid));
                if mid == u8::MAX {
                    break;
                }
                low = mid + 1;
            } else {
                // mid >= bounds.low >= 1
                high = mid - 1;
            }
        }

        // Iteration cap reached with the window still open: scan it top-down
        if low <= high {
            log::debug!(
                "  iteration cap hit, scanning {}..={} in steps of {}",
                low,
                high,
                self.quality_step
            );
            let mut quality = high;
            loop {
                if attempts.try_quality(quality)? {
                    best = best.max(Some(quality));
                    break;
                }
                match quality.checked_sub(self.quality_step) {
                    Some(next) if next >= low => quality = next,
                    _ => break,
                }
            }
        }

        match best {
            Some(found) => {
                let ceiling = found.saturating_add(self.neighbor_probe).min(bounds.high);
                for quality in found.saturating_add(1)..=ceiling {
                    if !attempts.contains(quality) {
                        attempts.try_quality(quality)?;
                    }
                }
                // Probed or not, the highest fitting quality measured wins
                let best_quality = attempts
                    .by_quality
                    .iter()
                    .rev()
                    .find(|(_, artifact)| artifact.byte_len() <= target_bytes)
                    .map(|(&q, _)| q)
                    .unwrap_or(found);

                self.finish(attempts, best_quality, true)
            }
            None => {
                if !attempts.contains(bounds.low) {
                    attempts.try_quality(bounds.low)?;
                }
                let lowest = attempts
                    .by_quality
                    .keys()
                    .next()
                    .copied()
                    .unwrap_or(bounds.low);
                self.finish(attempts, lowest, false)
            }
        }
    }

    fn finish(
        &self,
        mut attempts: Attempts<'_>,
        quality: u8,
        satisfied: bool,
    ) -> Result<SearchResult, CompressError> {
        let count = attempts.encodes;
        let artifact = attempts.by_quality.remove(&quality).ok_or_else(|| {
            CompressError::Encode(format!("no encoding recorded at quality {}", quality))
        })?;
        log::debug!(
            "  search settled on q={} ({} bytes, {} encodes, satisfied={})",
            quality,
            artifact.byte_len(),
            count,
            satisfied
        );
        Ok(SearchResult {
            artifact,
            quality,
            attempts: count,
            satisfied,
        })
    }
}
