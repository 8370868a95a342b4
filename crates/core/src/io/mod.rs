//! Block-wise raster I/O and vector table I/O
//!
//! Rasters are never read whole: a [`BlockReader`] hands out one [`Window`]
//! at a time and a [`BlockWriter`] accepts finished 8-bit blocks in row order.
//! Without the `gdal` feature GeoTIFFs go through the `tiff` crate and vector
//! tables are GeoJSON; with it, `.vrt` rasters and shapefiles open as well.

mod chunks;
#[cfg(feature = "gdal")]
mod gdal_io;
mod geojson_io;
mod native;

use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::{ColorTable, GeoTransform, PixelBlock, PixelType, Window};
use crate::source::{SourceKind, RASTER_SUFFIXES};
use crate::vector::FeatureCollection;

pub use chunks::decompress_chunk;
pub use geojson_io::{read_geojson, write_geojson};
pub use native::{GeoTiffTags, TiffBlockReader, TiffBlockWriter};

#[cfg(feature = "gdal")]
pub use gdal_io::{read_ogr, write_ogr, GdalBlockReader, GdalBlockWriter};

/// Output compression for reclassified rasters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Lzw,
}

/// Shape, storage layout and georeferencing of an opened raster.
#[derive(Debug, Clone)]
pub struct RasterInfo {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub pixel_type: PixelType,
    /// Rows per strip or tile height of the underlying storage
    pub natural_block_rows: usize,
    pub geo_transform: Option<GeoTransform>,
    /// Raw GeoTIFF tags, carried verbatim into the output
    pub geotiff_tags: GeoTiffTags,
    /// Projection as WKT, when the backend exposes one
    pub projection: Option<String>,
}

impl RasterInfo {
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// Reads single-band windows from a raster.
pub trait BlockReader: Send {
    fn info(&self) -> &RasterInfo;

    /// Read `window` of the 1-based `band` in its native pixel type.
    fn read_window(&mut self, band: usize, window: &Window) -> Result<PixelBlock>;
}

/// Writes a single-band 8-bit raster block by block.
pub trait BlockWriter: Send {
    /// Blocks must arrive in row order and together cover every row once.
    fn write_block(&mut self, window: &Window, data: &Array2<u8>) -> Result<()>;

    /// Attach the palette, flush and close the file.
    fn finish(self: Box<Self>, colors: Option<&ColorTable>) -> Result<()>;
}

/// Options for creating an output raster
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub compression: Compression,
    /// Rows per strip; also the expected block height
    pub block_rows: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: Compression::Lzw,
            block_rows: crate::raster::DEFAULT_BLOCK_ROWS,
        }
    }
}

fn suffix(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Open a raster for block reads.
pub fn open_raster<P: AsRef<Path>>(path: P) -> Result<Box<dyn BlockReader>> {
    let path = path.as_ref();
    let ext = suffix(path);
    if !RASTER_SUFFIXES.contains(&ext.as_str()) {
        return Err(Error::UnsupportedFormat(format!("{} is not a raster", path.display())));
    }

    #[cfg(feature = "gdal")]
    {
        Ok(Box::new(GdalBlockReader::open(path)?))
    }

    #[cfg(not(feature = "gdal"))]
    {
        if ext == "vrt" {
            return Err(Error::UnsupportedFormat(
                "VRT rasters require the `gdal` feature".to_string(),
            ));
        }
        Ok(Box::new(TiffBlockReader::open(path)?))
    }
}

/// Create a single-band 8-bit GeoTIFF shaped and georeferenced like `template`.
pub fn create_raster<P: AsRef<Path>>(
    path: P,
    template: &RasterInfo,
    options: &WriteOptions,
) -> Result<Box<dyn BlockWriter>> {
    #[cfg(feature = "gdal")]
    {
        Ok(Box::new(GdalBlockWriter::create(path.as_ref(), template, options)?))
    }

    #[cfg(not(feature = "gdal"))]
    {
        Ok(Box::new(TiffBlockWriter::create(path.as_ref(), template, options)?))
    }
}

/// Load a whole vector table.
pub fn read_vector<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let path = path.as_ref();
    match SourceKind::from_path(path)? {
        SourceKind::LocalVector => {}
        other => {
            return Err(Error::UnsupportedFormat(format!(
                "{} is a {other}, not a vector table",
                path.display()
            )))
        }
    }

    match suffix(path).as_str() {
        "geojson" => read_geojson(path),
        #[cfg(feature = "gdal")]
        _ => read_ogr(path),
        #[cfg(not(feature = "gdal"))]
        other => Err(Error::UnsupportedFormat(format!(
            ".{other} tables require the `gdal` feature"
        ))),
    }
}

/// Write a vector table in the format named by the path suffix.
pub fn write_vector<P: AsRef<Path>>(path: P, collection: &FeatureCollection) -> Result<()> {
    let path = path.as_ref();
    match suffix(path).as_str() {
        "geojson" => write_geojson(path, collection),
        #[cfg(feature = "gdal")]
        "shp" => write_ogr(path, collection),
        other => Err(Error::UnsupportedFormat(format!(
            "cannot write vector tables as .{other}"
        ))),
    }
}
