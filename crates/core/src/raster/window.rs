//! Rectangular raster windows

/// A rectangular region of a raster, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    /// First row of the window
    pub row_offset: usize,
    /// First column of the window
    pub col_offset: usize,
    /// Number of rows
    pub rows: usize,
    /// Number of columns
    pub cols: usize,
}

impl Window {
    pub fn new(row_offset: usize, col_offset: usize, rows: usize, cols: usize) -> Self {
        Self {
            row_offset,
            col_offset,
            rows,
            cols,
        }
    }

    /// A full-width band of rows.
    pub fn rows(row_offset: usize, rows: usize, cols: usize) -> Self {
        Self::new(row_offset, 0, rows, cols)
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// One past the last row.
    pub fn row_end(&self) -> usize {
        self.row_offset + self.rows
    }

    /// One past the last column.
    pub fn col_end(&self) -> usize {
        self.col_offset + self.cols
    }

    /// Whether the window lies inside a raster of `height` x `width`.
    pub fn fits(&self, height: usize, width: usize) -> bool {
        self.row_end() <= height && self.col_end() <= width
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}
