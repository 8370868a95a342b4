//! Raster data structures for block-wise processing

mod block;
mod color_table;
mod element;
mod geotransform;
mod window;

pub use block::{IntoPixelBlock, PixelBlock};
pub use color_table::ColorTable;
pub use element::{PixelType, RasterElement};
pub use geotransform::GeoTransform;
pub use window::Window;

/// Fallback block height when the storage has no usable natural block.
pub const DEFAULT_BLOCK_ROWS: usize = 256;
