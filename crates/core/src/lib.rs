//! # GeoClass Core
//!
//! Data model, error taxonomy and I/O for the GeoClass reclassification engine.
//!
//! This crate provides:
//! - `ClassTable`: destination class codes with display names and colors
//! - `Matrix` / `MatrixBuilder`: the destination → source-values mapping and its inverse
//! - `SourceDescriptor`: what to reclassify and where it lives
//! - Block-wise raster I/O (`io::BlockReader`, `io::BlockWriter`) and vector tables
//! - `Error` / `ReclassifyError`: failures tagged with source and stage

pub mod class_table;
pub mod error;
pub mod io;
pub mod matrix;
pub mod raster;
pub mod source;
pub mod vector;

pub use class_table::{ClassEntry, ClassTable, Rgb};
pub use error::{Error, ReclassifyError, Result, Stage, StageContext};
pub use matrix::{Inverse, Matrix, MatrixBuilder, SourceValue};
pub use source::{BandOrColumn, SourceDescriptor, SourceKind};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::class_table::{ClassEntry, ClassTable, Rgb};
    pub use crate::error::{Error, ReclassifyError, Result, Stage, StageContext};
    pub use crate::matrix::{Matrix, MatrixBuilder, SourceValue};
    pub use crate::raster::{GeoTransform, PixelType, Window};
    pub use crate::source::{BandOrColumn, SourceDescriptor, SourceKind};
}
