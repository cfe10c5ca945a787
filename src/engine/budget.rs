//! Running byte budget for the per-page rasterize pass.

use crate::config::defaults::{PDF_BASE_OVERHEAD, PDF_PAGE_OVERHEAD};

/// Bytes left for page images once the PDF container overhead is reserved.
pub fn image_budget(target_bytes: u64, pages: usize) -> u64 {
    let overhead = PDF_BASE_OVERHEAD.saturating_add(PDF_PAGE_OVERHEAD.saturating_mul(pages as u64));
    target_bytes.saturating_sub(overhead)
}

/// Splits a document budget across pages, recomputing after every page.
///
/// Pages that come in under their share leave more for the ones after them;
/// pages that overshoot take it away. The planned shares always sum to the
/// remaining budget exactly.
#[derive(Debug, Clone)]
pub struct BudgetAllocator {
    remaining: u64,
    pages_left: usize,
}

impl BudgetAllocator {
    pub fn new(total: u64, pages: usize) -> Self {
        Self {
            remaining: total,
            pages_left: pages,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn pages_left(&self) -> usize {
        self.pages_left
    }

    /// Even split of what is left; the remainder goes to the earliest pages.
    pub fn plan(&self) -> Vec<u64> {
        if self.pages_left == 0 {
            return Vec::new();
        }
        let n = self.pages_left as u64;
        let base = self.remaining / n;
        let extra = self.remaining % n;
        (0..n).map(|i| base + u64::from(i < extra)).collect()
    }

    /// Share for the next page (the head of `plan`)
    pub fn next_share(&self) -> u64 {
        if self.pages_left == 0 {
            return 0;
        }
        let n = self.pages_left as u64;
        self.remaining / n + u64::from(self.remaining % n > 0)
    }

    /// Record the bytes a page actually used and move to the next page.
    pub fn consume(&mut self, actual: u64) {
        self.remaining = self.remaining.saturating_sub(actual);
        self.pages_left = self.pages_left.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_even_split_with_remainder() {
        let alloc = BudgetAllocator::new(10, 3);
        assert_eq!(alloc.plan(), vec![4, 3, 3]);
        assert_eq!(alloc.next_share(), 4);
    }

    #[test]
    fn test_savings_flow_to_later_pages() {
        let mut alloc = BudgetAllocator::new(900, 3);
        assert_eq!(alloc.next_share(), 300);
        alloc.consume(100);
        assert_eq!(alloc.plan(), vec![400, 400]);
        alloc.consume(500);
        assert_eq!(alloc.plan(), vec![300]);
    }

    #[test]
    fn test_overshoot_saturates() {
        let mut alloc = BudgetAllocator::new(100, 2);
        alloc.consume(250);
        assert_eq!(alloc.remaining(), 0);
        assert_eq!(alloc.next_share(), 0);
        alloc.consume(10);
        assert_eq!(alloc.pages_left(), 0);
        assert!(alloc.plan().is_empty());
    }

    #[test]
    fn test_image_budget_reserves_overhead() {
        assert_eq!(
            image_budget(100_000, 10),
            100_000 - PDF_BASE_OVERHEAD - 10 * PDF_PAGE_OVERHEAD
        );
        assert_eq!(image_budget(100, 10), 0);
    }

    proptest! {
        #[test]
        fn prop_plan_sums_to_remaining(
            total in 0u64..10_000_000,
            pages in 1usize..64,
            usage in proptest::collection::vec(0u64..500_000, 0..64),
        ) {
            let mut alloc = BudgetAllocator::new(total, pages);
            for used in usage.into_iter().take(pages) {
                let plan = alloc.plan();
                prop_assert_eq!(plan.iter().sum::<u64>(), alloc.remaining());
                prop_assert_eq!(plan.len(), alloc.pages_left());
                prop_assert_eq!(plan[0], alloc.next_share());
                alloc.consume(used);
            }
        }
    }
}
