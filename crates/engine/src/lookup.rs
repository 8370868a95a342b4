//! Elementwise remapping of raster blocks into 8-bit class codes

use std::collections::HashMap;

use geoclass_core::raster::{PixelBlock, PixelType};
use geoclass_core::{Error, Inverse, Result, SourceValue};
use ndarray::Array2;

/// Largest code an 8-bit output band holds.
pub const MAX_OUTPUT_CODE: i64 = u8::MAX as i64;

/// Check that a destination code fits the 8-bit output.
pub fn output_code(code: i64) -> Result<u8> {
    u8::try_from(code).map_err(|_| Error::ClassCodeRange {
        code,
        max: MAX_OUTPUT_CODE,
    })
}

#[inline]
fn dense_index(key: i64, offset: i64) -> Option<usize> {
    key.checked_sub(offset).and_then(|d| usize::try_from(d).ok())
}

#[derive(Debug, Clone)]
enum Table {
    /// One slot per representable value, indexed by `key - offset`
    Dense { offset: i64, codes: Vec<u8> },
    Sparse(HashMap<i64, u8>),
}

/// Source pixel → output code lookup for one pixel type.
///
/// Types up to 16 bits get a flat table so a block is remapped with a single
/// indexed load per pixel; wider types fall back to a hash map.
#[derive(Debug, Clone)]
pub struct LookupTable {
    table: Table,
    default: u8,
}

impl LookupTable {
    /// Build the lookup for rasters of `pixel_type`.
    ///
    /// Fails with `UnsupportedPixelType` for floating point (and `u64`) input
    /// and with `ClassCodeRange` when a destination or default code does not
    /// fit in a byte. Text source values can never match a pixel and are
    /// skipped.
    pub fn for_raster(inverse: &Inverse, pixel_type: PixelType) -> Result<Self> {
        if !pixel_type.is_categorical() {
            return Err(Error::UnsupportedPixelType(format!(
                "{pixel_type} bands cannot be reclassified; only integer rasters hold discrete classes"
            )));
        }

        let default = output_code(inverse.default_value())?;
        let mut pairs = Vec::with_capacity(inverse.len());
        for (value, code) in inverse.iter() {
            let code = output_code(code)?;
            match value {
                SourceValue::Int(key) => pairs.push((*key, code)),
                SourceValue::Text(text) => {
                    tracing::debug!(value = %text, "text source value cannot match raster pixels")
                }
            }
        }

        let table = if pixel_type.bits() <= 16 {
            let offset = pixel_type.min_key();
            let mut codes = vec![default; 1usize << pixel_type.bits()];
            for (key, code) in pairs {
                if let Some(slot) = dense_index(key, offset).and_then(|i| codes.get_mut(i)) {
                    *slot = code;
                }
            }
            Table::Dense { offset, codes }
        } else {
            Table::Sparse(pairs.into_iter().collect())
        };

        Ok(Self { table, default })
    }

    #[inline]
    pub fn get(&self, key: i64) -> u8 {
        match &self.table {
            Table::Dense { offset, codes } => dense_index(key, *offset)
                .and_then(|i| codes.get(i).copied())
                .unwrap_or(self.default),
            Table::Sparse(map) => map.get(&key).copied().unwrap_or(self.default),
        }
    }

    pub fn default_code(&self) -> u8 {
        self.default
    }

    /// Remap a whole block.
    pub fn remap(&self, block: &PixelBlock) -> Array2<u8> {
        block.map_to_u8(|key| self.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoclass_core::raster::Window;
    use geoclass_core::Matrix;

    #[test]
    fn test_dense_lookup_signed() {
        let matrix = Matrix::from_buckets(vec![(10, vec![-5i64, 1]), (20, vec![300])], 0);
        let lut = LookupTable::for_raster(matrix.invert(), PixelType::I16).unwrap();
        assert_eq!(lut.get(-5), 10);
        assert_eq!(lut.get(1), 10);
        assert_eq!(lut.get(300), 20);
        assert_eq!(lut.get(2), 0);
    }

    #[test]
    fn test_sparse_lookup() {
        let matrix = Matrix::from_buckets(vec![(7, vec![1_000_000i64])], 3);
        let lut = LookupTable::for_raster(matrix.invert(), PixelType::I32).unwrap();
        assert_eq!(lut.get(1_000_000), 7);
        assert_eq!(lut.get(5), 3);
    }

    #[test]
    fn test_keys_outside_type_are_ignored() {
        let matrix = Matrix::from_buckets(vec![(1, vec![-1i64, 256])], 0);
        let lut = LookupTable::for_raster(matrix.invert(), PixelType::U8).unwrap();
        assert_eq!(lut.get(255), 0);
        assert_eq!(lut.get(0), 0);
    }

    #[test]
    fn test_rejects_float_and_wide_codes() {
        let matrix = Matrix::from_buckets(vec![(1, vec![1i64])], 0);
        assert!(matches!(
            LookupTable::for_raster(matrix.invert(), PixelType::F32),
            Err(Error::UnsupportedPixelType(_))
        ));

        let wide = Matrix::from_buckets(vec![(256, vec![1i64])], 0);
        assert!(matches!(
            LookupTable::for_raster(wide.invert(), PixelType::U8),
            Err(Error::ClassCodeRange { code: 256, .. })
        ));

        let negative_default = Matrix::from_buckets(vec![(1, vec![1i64])], -1);
        assert!(LookupTable::for_raster(negative_default.invert(), PixelType::U8).is_err());
    }

    #[test]
    fn test_remap_block() {
        let matrix = Matrix::from_buckets(vec![(10, vec![1i64, 2]), (20, vec![3])], 0);
        let lut = LookupTable::for_raster(matrix.invert(), PixelType::U16).unwrap();
        let block = PixelBlock::from_vec(vec![1u16, 2, 3, 4], &Window::rows(0, 2, 2)).unwrap();
        let out = lut.remap(&block);
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![10, 10, 20, 0]);
    }
}
