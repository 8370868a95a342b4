//! Block I/O and vector tables through GDAL/OGR

use std::path::{Path, PathBuf};

use gdal::raster::{ColorEntry, ColorTable as GdalColorTable, GdalDataType, PaletteInterpretation};
use gdal::vector::{FieldValue, LayerAccess, LayerOptions, OGRFieldType, ToGdal};
use gdal::{Dataset, DriverManager};
use ndarray::Array2;

use crate::error::{Error, Result};
use crate::io::{BlockReader, BlockWriter, Compression, GeoTiffTags, RasterInfo, WriteOptions};
use crate::raster::{ColorTable, GeoTransform, PixelBlock, PixelType, Window};
use crate::vector::{AttributeValue, Feature, FeatureCollection};

fn pixel_type(t: GdalDataType) -> PixelType {
    match t {
        GdalDataType::UInt8 => PixelType::U8,
        GdalDataType::Int8 => PixelType::I8,
        GdalDataType::UInt16 => PixelType::U16,
        GdalDataType::Int16 => PixelType::I16,
        GdalDataType::UInt32 => PixelType::U32,
        GdalDataType::Int32 => PixelType::I32,
        GdalDataType::UInt64 => PixelType::U64,
        GdalDataType::Int64 => PixelType::I64,
        GdalDataType::Float32 => PixelType::F32,
        _ => PixelType::F64,
    }
}

/// Raster reader for anything GDAL opens, including VRT mosaics
pub struct GdalBlockReader {
    path: PathBuf,
    dataset: Dataset,
    info: RasterInfo,
}

// GDAL datasets may move between threads as long as only one uses them at a time.
unsafe impl Send for GdalBlockReader {}

impl GdalBlockReader {
    pub fn open(path: &Path) -> Result<Self> {
        let dataset = Dataset::open(path)?;
        let (width, height) = dataset.raster_size();
        let band_count = dataset.raster_count() as usize;

        let first = dataset.rasterband(1)?;
        let (_, block_rows) = first.block_size();
        let info = RasterInfo {
            width,
            height,
            band_count,
            pixel_type: pixel_type(first.band_type()),
            natural_block_rows: block_rows.max(1),
            geo_transform: dataset.geo_transform().ok().map(GeoTransform::from_gdal),
            geotiff_tags: GeoTiffTags::default(),
            projection: Some(dataset.projection()).filter(|p| !p.is_empty()),
        };
        drop(first);

        Ok(Self {
            path: path.to_path_buf(),
            dataset,
            info,
        })
    }
}

impl BlockReader for GdalBlockReader {
    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn read_window(&mut self, band: usize, window: &Window) -> Result<PixelBlock> {
        let rasterband = self.dataset.rasterband(band)?;
        let pixel_type = pixel_type(rasterband.band_type());
        let origin = (window.col_offset as isize, window.row_offset as isize);
        let size = (window.cols, window.rows);

        macro_rules! read {
            ($t:ty) => {{
                let buffer = rasterband.read_as::<$t>(origin, size, size, None)?;
                PixelBlock::from_vec(buffer.data().to_vec(), window)
            }};
        }

        match pixel_type {
            PixelType::U8 => read!(u8),
            PixelType::I8 => read!(i8),
            PixelType::U16 => read!(u16),
            PixelType::I16 => read!(i16),
            PixelType::U32 => read!(u32),
            PixelType::I32 => read!(i32),
            PixelType::I64 => read!(i64),
            other => Err(Error::UnsupportedPixelType(format!(
                "{other} band in {}",
                self.path.display()
            ))),
        }
    }
}

/// Single-band 8-bit GTiff writer
pub struct GdalBlockWriter {
    path: PathBuf,
    dataset: Dataset,
    height: usize,
    next_row: usize,
}

unsafe impl Send for GdalBlockWriter {}

impl GdalBlockWriter {
    pub fn create(path: &Path, template: &RasterInfo, options: &WriteOptions) -> Result<Self> {
        let driver = DriverManager::get_driver_by_name("GTiff")?;

        let mut create_options = vec![format!("BLOCKYSIZE={}", options.block_rows.max(1))];
        if options.compression == Compression::Lzw {
            create_options.push("COMPRESS=LZW".to_string());
        }
        let create_options_refs: Vec<&str> = create_options.iter().map(|s| s.as_str()).collect();

        let mut dataset = driver.create_with_band_type_with_options::<u8, _>(
            path,
            template.width as isize,
            template.height as isize,
            1,
            &create_options_refs,
        )?;

        if let Some(gt) = template.geo_transform {
            dataset.set_geo_transform(&gt.to_gdal())?;
        }
        if let Some(wkt) = &template.projection {
            dataset.set_projection(wkt)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            dataset,
            height: template.height,
            next_row: 0,
        })
    }
}

impl BlockWriter for GdalBlockWriter {
    fn write_block(&mut self, window: &Window, data: &Array2<u8>) -> Result<()> {
        if window.row_offset != self.next_row {
            return Err(Error::PartialWrite {
                path: self.path.clone(),
                reason: format!("block {window:?} out of order, expected row {}", self.next_row),
            });
        }
        let mut band = self.dataset.rasterband(1)?;
        let values: Vec<u8> = data.iter().copied().collect();
        band.write(
            (window.col_offset as isize, window.row_offset as isize),
            (window.cols, window.rows),
            &values,
        )?;
        self.next_row = window.row_end();
        Ok(())
    }

    fn finish(self: Box<Self>, colors: Option<&ColorTable>) -> Result<()> {
        if self.next_row != self.height {
            return Err(Error::PartialWrite {
                path: self.path.clone(),
                reason: format!("only {} of {} rows written", self.next_row, self.height),
            });
        }
        if let Some(colors) = colors {
            let mut table = GdalColorTable::new(PaletteInterpretation::Rgba);
            for (index, [r, g, b, a]) in colors.iter() {
                table.set_color_entry(
                    u16::from(index),
                    &ColorEntry::rgba(i16::from(r), i16::from(g), i16::from(b), i16::from(a)),
                );
            }
            let mut band = self.dataset.rasterband(1)?;
            band.set_color_table(&table);
        }
        // Dropping the dataset flushes and closes it.
        drop(self.dataset);
        Ok(())
    }
}

fn field_to_attribute(value: Option<FieldValue>) -> AttributeValue {
    match value {
        None => AttributeValue::Null,
        Some(FieldValue::IntegerValue(v)) => AttributeValue::Int(i64::from(v)),
        Some(FieldValue::Integer64Value(v)) => AttributeValue::Int(v),
        Some(FieldValue::RealValue(v)) => AttributeValue::Float(v),
        Some(FieldValue::StringValue(v)) => AttributeValue::String(v),
        Some(other) => AttributeValue::String(format!("{other:?}")),
    }
}

fn attribute_to_field(value: &AttributeValue) -> Option<FieldValue> {
    match value {
        AttributeValue::Null => None,
        AttributeValue::Int(v) => Some(FieldValue::Integer64Value(*v)),
        AttributeValue::Float(v) => Some(FieldValue::RealValue(*v)),
        AttributeValue::Bool(v) => Some(FieldValue::StringValue(v.to_string())),
        AttributeValue::String(v) => Some(FieldValue::StringValue(v.clone())),
        AttributeValue::Json(v) => Some(FieldValue::StringValue(v.to_string())),
    }
}

/// Read the first layer of an OGR data source (shapefile, GeoPackage, ...).
pub fn read_ogr(path: &Path) -> Result<FeatureCollection> {
    let dataset = Dataset::open(path)?;
    let mut layer = dataset.layer(0)?;
    let columns: Vec<String> = layer.defn().fields().map(|f| f.name()).collect();

    let mut collection = FeatureCollection::new();
    collection.columns = columns.clone();
    for ogr_feature in layer.features() {
        let mut feature = match ogr_feature.geometry() {
            Some(g) => Feature::new(g.to_geo()?),
            None => Feature::empty(),
        };
        feature.id = ogr_feature.fid().map(|fid| AttributeValue::Int(fid as i64));
        for name in &columns {
            feature.set_property(name.clone(), field_to_attribute(ogr_feature.field(name)?));
        }
        collection.push(feature);
    }
    Ok(collection)
}

/// Write a feature collection with the OGR driver matching the path suffix.
pub fn write_ogr(path: &Path, collection: &FeatureCollection) -> Result<()> {
    let driver = DriverManager::get_driver_by_name("ESRI Shapefile")?;
    let mut dataset = driver.create_vector_only(path)?;
    let layer_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("layer")
        .to_string();
    let mut layer = dataset.create_layer(LayerOptions {
        name: &layer_name,
        ..Default::default()
    })?;

    let field_type = |column: &str| {
        let sample = collection
            .iter()
            .filter_map(|f| f.get_property(column))
            .find(|v| **v != AttributeValue::Null);
        match sample {
            Some(AttributeValue::Int(_)) => OGRFieldType::OFTInteger64,
            Some(AttributeValue::Float(_)) => OGRFieldType::OFTReal,
            _ => OGRFieldType::OFTString,
        }
    };
    let defs: Vec<(&str, u32)> = collection
        .columns
        .iter()
        .map(|c| (c.as_str(), field_type(c)))
        .collect();
    layer.create_defn_fields(&defs)?;

    for feature in collection.iter() {
        let geometry = match &feature.geometry {
            Some(g) => g.to_gdal()?,
            None => gdal::vector::Geometry::empty(gdal::vector::OGRwkbGeometryType::wkbUnknown)?,
        };
        let mut names = Vec::new();
        let mut values = Vec::new();
        for column in &collection.columns {
            if let Some(value) = feature.get_property(column).and_then(attribute_to_field) {
                names.push(column.as_str());
                values.push(value);
            }
        }
        layer.create_feature_fields(geometry, &names, &values)?;
    }
    Ok(())
}
