//! Typed pixel blocks read from a raster band

use ndarray::Array2;

use crate::error::{Error, Result};
use crate::raster::{PixelType, RasterElement, Window};

/// One window of a band, in its native integer type.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBlock {
    U8(Array2<u8>),
    I8(Array2<i8>),
    U16(Array2<u16>),
    I16(Array2<i16>),
    U32(Array2<u32>),
    I32(Array2<i32>),
    I64(Array2<i64>),
}

macro_rules! with_block {
    ($block:expr, $arr:ident => $body:expr) => {
        match $block {
            PixelBlock::U8($arr) => $body,
            PixelBlock::I8($arr) => $body,
            PixelBlock::U16($arr) => $body,
            PixelBlock::I16($arr) => $body,
            PixelBlock::U32($arr) => $body,
            PixelBlock::I32($arr) => $body,
            PixelBlock::I64($arr) => $body,
        }
    };
}

/// Conversion from a typed array into the matching [`PixelBlock`] variant.
pub trait IntoPixelBlock: RasterElement {
    fn into_block(data: Array2<Self>) -> PixelBlock;
}

macro_rules! impl_into_block {
    ($t:ty, $variant:ident) => {
        impl IntoPixelBlock for $t {
            fn into_block(data: Array2<Self>) -> PixelBlock {
                PixelBlock::$variant(data)
            }
        }
    };
}

impl_into_block!(u8, U8);
impl_into_block!(i8, I8);
impl_into_block!(u16, U16);
impl_into_block!(i16, I16);
impl_into_block!(u32, U32);
impl_into_block!(i32, I32);
impl_into_block!(i64, I64);

impl PixelBlock {
    /// Wrap a row-major buffer covering `window`.
    pub fn from_vec<T: IntoPixelBlock>(data: Vec<T>, window: &Window) -> Result<Self> {
        let array = Array2::from_shape_vec(window.shape(), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(T::into_block(array))
    }

    pub fn pixel_type(&self) -> PixelType {
        match self {
            PixelBlock::U8(_) => PixelType::U8,
            PixelBlock::I8(_) => PixelType::I8,
            PixelBlock::U16(_) => PixelType::U16,
            PixelBlock::I16(_) => PixelType::I16,
            PixelBlock::U32(_) => PixelType::U32,
            PixelBlock::I32(_) => PixelType::I32,
            PixelBlock::I64(_) => PixelType::I64,
        }
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        with_block!(self, a => a.dim())
    }

    /// Number of pixels held in memory
    pub fn len(&self) -> usize {
        with_block!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every pixel as an integer key, row-major.
    pub fn for_each_key<F: FnMut(i64)>(&self, mut f: F) {
        with_block!(self, a => a.iter().for_each(|v| f(v.to_key())))
    }

    /// Elementwise map into an 8-bit output block of the same shape.
    pub fn map_to_u8<F: Fn(i64) -> u8>(&self, f: F) -> Array2<u8> {
        with_block!(self, a => a.mapv(|v| f(v.to_key())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_from_vec() {
        let w = Window::rows(0, 2, 3);
        let block = PixelBlock::from_vec(vec![1i16, -2, 3, 4, 5, 6], &w).unwrap();
        assert_eq!(block.pixel_type(), PixelType::I16);
        assert_eq!(block.shape(), (2, 3));

        let mut keys = Vec::new();
        block.for_each_key(|k| keys.push(k));
        assert_eq!(keys, vec![1, -2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_block_shape_mismatch() {
        let w = Window::rows(0, 2, 3);
        assert!(PixelBlock::from_vec(vec![1u8, 2], &w).is_err());
    }

    #[test]
    fn test_map_to_u8() {
        let w = Window::rows(0, 1, 3);
        let block = PixelBlock::from_vec(vec![100u32, 200, 300], &w).unwrap();
        let out = block.map_to_u8(|k| if k > 150 { 1 } else { 0 });
        assert_eq!(out.iter().copied().collect::<Vec<u8>>(), vec![0, 1, 1]);
    }
}
