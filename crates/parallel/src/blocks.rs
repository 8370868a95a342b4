//! Row-band block plans for windowed raster passes

use geoclass_core::raster::{Window, DEFAULT_BLOCK_ROWS};

/// Natural blocks shorter than this are merged into taller bands.
pub const MIN_BLOCK_ROWS: usize = 64;

/// Block height for a raster of `height` rows stored in blocks of `natural_rows`.
///
/// An explicit `override_rows` wins. Otherwise the natural block height is
/// used, rounded up to a multiple of itself of at least [`MIN_BLOCK_ROWS`]
/// so tiny strips do not turn into thousands of reads, and
/// [`DEFAULT_BLOCK_ROWS`] when the natural block is the whole image.
pub fn choose_block_rows(natural_rows: usize, height: usize, override_rows: Option<usize>) -> usize {
    let height = height.max(1);
    if let Some(rows) = override_rows {
        return rows.clamp(1, height);
    }
    if natural_rows == 0 || natural_rows >= height {
        return DEFAULT_BLOCK_ROWS.min(height);
    }
    let rows = if natural_rows < MIN_BLOCK_ROWS {
        natural_rows * MIN_BLOCK_ROWS.div_ceil(natural_rows)
    } else {
        natural_rows
    };
    rows.min(height)
}

/// Full-width row bands covering a raster exactly once, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlan {
    pub height: usize,
    pub width: usize,
    pub block_rows: usize,
}

impl BlockPlan {
    pub fn new(height: usize, width: usize, block_rows: usize) -> Self {
        Self {
            height,
            width,
            block_rows: block_rows.max(1),
        }
    }

    pub fn block_count(&self) -> usize {
        self.height.div_ceil(self.block_rows)
    }

    /// Largest number of pixels any one block holds.
    pub fn max_block_pixels(&self) -> usize {
        self.block_rows.min(self.height) * self.width
    }

    pub fn windows(&self) -> BlockIter {
        BlockIter {
            plan: *self,
            next_row: 0,
        }
    }
}

/// Iterator over the windows of a [`BlockPlan`]
#[derive(Debug, Clone)]
pub struct BlockIter {
    plan: BlockPlan,
    next_row: usize,
}

impl Iterator for BlockIter {
    type Item = Window;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_row >= self.plan.height || self.plan.width == 0 {
            return None;
        }
        let rows = self.plan.block_rows.min(self.plan.height - self.next_row);
        let window = Window::rows(self.next_row, rows, self.plan.width);
        self.next_row += rows;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.plan.width == 0 {
            0
        } else {
            self.plan.height.saturating_sub(self.next_row).div_ceil(self.plan.block_rows)
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BlockIter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_rows_policy() {
        // tiled or striped storage keeps its natural height
        assert_eq!(choose_block_rows(256, 10_000, None), 256);
        // one-row strips merge into 64-row bands
        assert_eq!(choose_block_rows(1, 10_000, None), 64);
        // 48-row strips round up to two strips
        assert_eq!(choose_block_rows(48, 10_000, None), 96);
        // a single strip for the whole image falls back
        assert_eq!(choose_block_rows(10_000, 10_000, None), DEFAULT_BLOCK_ROWS);
        assert_eq!(choose_block_rows(100, 100, None), 100);
        // explicit override
        assert_eq!(choose_block_rows(16, 10_000, Some(10)), 10);
        assert_eq!(choose_block_rows(16, 5, Some(10)), 5);
    }

    #[test]
    fn test_block_coverage() {
        let plan = BlockPlan::new(1000, 37, 64);
        let mut covered = vec![false; 1000];
        let windows: Vec<_> = plan.windows().collect();
        assert_eq!(windows.len(), plan.block_count());

        for w in &windows {
            assert_eq!(w.col_offset, 0);
            assert_eq!(w.cols, 37);
            for r in w.row_offset..w.row_end() {
                assert!(!covered[r], "row {r} covered twice");
                covered[r] = true;
            }
        }
        assert!(covered.iter().all(|&c| c));
        assert_eq!(windows.last().unwrap().rows, 1000 - 15 * 64);
    }

    #[test]
    fn test_block_size_independent_of_height() {
        let small = BlockPlan::new(512, 100, 64);
        let huge = BlockPlan::new(1_000_000, 100, 64);
        assert_eq!(small.max_block_pixels(), huge.max_block_pixels());
    }
}
