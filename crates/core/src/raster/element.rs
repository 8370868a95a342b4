//! Pixel types and the element trait for categorical raster values

use std::fmt::{self, Debug};

use num_traits::{AsPrimitive, PrimInt};
use serde::{Deserialize, Serialize};

/// Storage type of a raster band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl PixelType {
    /// Map TIFF `BitsPerSample` / `SampleFormat` (1 = uint, 2 = int, 3 = float).
    pub fn from_tiff(bits_per_sample: u16, sample_format: u16) -> Option<Self> {
        let ty = match (sample_format, bits_per_sample) {
            (1, 8) => PixelType::U8,
            (1, 16) => PixelType::U16,
            (1, 32) => PixelType::U32,
            (1, 64) => PixelType::U64,
            (2, 8) => PixelType::I8,
            (2, 16) => PixelType::I16,
            (2, 32) => PixelType::I32,
            (2, 64) => PixelType::I64,
            (3, 32) => PixelType::F32,
            (3, 64) => PixelType::F64,
            _ => return None,
        };
        Some(ty)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, PixelType::F32 | PixelType::F64)
    }

    /// Whether every value of this type converts to an `i64` lookup key.
    pub fn is_categorical(&self) -> bool {
        !self.is_float() && *self != PixelType::U64
    }

    pub fn bits(&self) -> u32 {
        match self {
            PixelType::U8 | PixelType::I8 => 8,
            PixelType::U16 | PixelType::I16 => 16,
            PixelType::U32 | PixelType::I32 | PixelType::F32 => 32,
            PixelType::U64 | PixelType::I64 | PixelType::F64 => 64,
        }
    }

    /// Smallest representable value, for dense lookup tables.
    pub fn min_key(&self) -> i64 {
        match self {
            PixelType::I8 => i8::MIN as i64,
            PixelType::I16 => i16::MIN as i64,
            PixelType::I32 => i32::MIN as i64,
            PixelType::I64 => i64::MIN,
            _ => 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PixelType::U8 => "uint8",
            PixelType::I8 => "int8",
            PixelType::U16 => "uint16",
            PixelType::I16 => "int16",
            PixelType::U32 => "uint32",
            PixelType::I32 => "int32",
            PixelType::U64 => "uint64",
            PixelType::I64 => "int64",
            PixelType::F32 => "float32",
            PixelType::F64 => "float64",
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trait for integer types that can be stored in a categorical raster cell.
pub trait RasterElement: PrimInt + AsPrimitive<i64> + Debug + Send + Sync + 'static {
    /// Pixel type tag of this element
    const PIXEL_TYPE: PixelType;

    /// Exact integer key used for matrix lookups
    fn to_key(self) -> i64 {
        self.as_()
    }
}

macro_rules! impl_raster_element {
    ($t:ty, $pt:expr) => {
        impl RasterElement for $t {
            const PIXEL_TYPE: PixelType = $pt;
        }
    };
}

impl_raster_element!(u8, PixelType::U8);
impl_raster_element!(i8, PixelType::I8);
impl_raster_element!(u16, PixelType::U16);
impl_raster_element!(i16, PixelType::I16);
impl_raster_element!(u32, PixelType::U32);
impl_raster_element!(i32, PixelType::I32);
impl_raster_element!(i64, PixelType::I64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tiff() {
        assert_eq!(PixelType::from_tiff(8, 1), Some(PixelType::U8));
        assert_eq!(PixelType::from_tiff(16, 2), Some(PixelType::I16));
        assert_eq!(PixelType::from_tiff(32, 3), Some(PixelType::F32));
        assert_eq!(PixelType::from_tiff(12, 1), None);
    }

    #[test]
    fn test_categorical() {
        assert!(PixelType::I32.is_categorical());
        assert!(!PixelType::F64.is_categorical());
        assert!(!PixelType::U64.is_categorical());
    }

    #[test]
    fn test_to_key() {
        assert_eq!((-5i8).to_key(), -5);
        assert_eq!(u32::MAX.to_key(), u32::MAX as i64);
    }
}
