use std::ops::Range;

use super::PixelRect;
use crate::camera::ViewportSize;
use crate::util::{Error, Result};

/// Grid of equally sized square cells, one VPL depth render per cell.
///
/// Cell `i` sits at row `i / cols`, column `i % cols`. Cells past the VPL
/// count are never drawn or sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    pub rows: u32,
    pub cols: u32,
    pub cell_size: u32,
}

impl AtlasLayout {
    pub fn new(rows: u32, cols: u32, cell_size: u32) -> Result<Self> {
        if rows == 0 || cols == 0 || cell_size == 0 {
            return Err(Error::other(format!(
                "atlas needs non-zero rows, cols and cell size (got {}x{} cells of {})",
                rows, cols, cell_size
            )));
        }
        Ok(Self { rows, cols, cell_size })
    }

    /// Check that every one of `count` VPLs gets a cell.
    pub fn ensure_fits(&self, count: usize) -> Result<()> {
        if count > self.capacity() {
            return Err(Error::other(format!(
                "{} VPLs do not fit a {}x{} atlas",
                count, self.rows, self.cols
            )));
        }
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        (self.rows * self.cols) as usize
    }

    pub fn size(&self) -> ViewportSize {
        ViewportSize::new(self.cols * self.cell_size, self.rows * self.cell_size)
    }

    pub fn cell_rect(&self, index: usize) -> PixelRect {
        let row = index as u32 / self.cols;
        let col = index as u32 % self.cols;
        PixelRect::new(col * self.cell_size, row * self.cell_size, self.cell_size, self.cell_size)
    }

    /// Rows holding at least one of `count` VPLs.
    pub fn rows_used(&self, count: usize) -> u32 {
        (count.min(self.capacity()) as u32).div_ceil(self.cols)
    }

    /// Indices of the VPLs drawn in `row`.
    pub fn row_range(&self, row: u32, count: usize) -> Range<usize> {
        let start = (row * self.cols) as usize;
        let end = start + self.cols as usize;
        start.min(count)..end.min(count)
    }
}
