//! # GeoClass Colormap
//!
//! Categorical palettes for reclassified outputs.
//!
//! A [`CategoricalPalette`] is built from the destination `ClassTable` and
//! turns into whatever the output format understands: a raster color table
//! or image-level visualization properties for the remote backend.
//!
//! ## Usage
//!
//! ```ignore
//! use geoclass_colormap::CategoricalPalette;
//!
//! let palette = CategoricalPalette::from_class_table(&table);
//! let colors = palette.color_table()?;
//! ```

mod palette;

pub use palette::{CategoricalPalette, VisualizationProperties, NO_DATA_LABEL};
