//! Fixtures shared by the engine integration tests.
#![allow(dead_code)]

use std::fs::File;
use std::path::Path;

use geoclass_core::io::open_raster;
use geoclass_core::raster::Window;
use geoclass_core::ClassTable;
use tiff::encoder::colortype::ColorType;
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

pub const MODEL_PIXEL_SCALE: u16 = 33550;
pub const MODEL_TIEPOINT: u16 = 33922;
pub const GEO_KEY_DIRECTORY: u16 = 34735;
pub const GEO_ASCII_PARAMS: u16 = 34737;

/// Write a single-band striped GeoTIFF anchored at (500000, 4000000), 30 m pixels,
/// in UTM zone 33N.
pub fn write_tiff<C>(path: &Path, width: u32, height: u32, rows_per_strip: u32, data: &[C::Inner])
where
    C: ColorType,
    [C::Inner]: TiffValue,
{
    assert_eq!(data.len(), (width * height) as usize);
    let file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    let mut image = encoder.new_image::<C>(width, height).unwrap();
    image.rows_per_strip(rows_per_strip).unwrap();
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), &[30.0f64, 30.0, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(
            Tag::from_u16_exhaustive(MODEL_TIEPOINT),
            &[0.0f64, 0.0, 0.0, 500_000.0, 4_000_000.0, 0.0][..],
        )
        .unwrap();
    image
        .encoder()
        .write_tag(
            Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY),
            &[1u16, 1, 0, 3, 1024, 0, 1, 1, 3072, 0, 1, 32633, 1026, GEO_ASCII_PARAMS, 18, 0][..],
        )
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(GEO_ASCII_PARAMS), "WGS 84 / UTM 33N|")
        .unwrap();

    let mut offset = 0usize;
    while image.next_strip_sample_count() > 0 {
        let n = image.next_strip_sample_count() as usize;
        image.write_strip(&data[offset..offset + n]).unwrap();
        offset += n;
    }
    image.finish().unwrap();
}

/// Band 1 of a raster, row-major.
pub fn read_band(path: &Path) -> Vec<i64> {
    let mut reader = open_raster(path).unwrap();
    let info = reader.info().clone();
    let block = reader
        .read_window(1, &Window::rows(0, info.height, info.width))
        .unwrap();
    let mut keys = Vec::with_capacity(block.len());
    block.for_each_key(|k| keys.push(k));
    keys
}

/// `width * height` pixels cycling through `values`.
pub fn cycle<T: Copy>(values: &[T], width: u32, height: u32) -> Vec<T> {
    values.iter().copied().cycle().take((width * height) as usize).collect()
}

pub fn land_cover_classes() -> ClassTable {
    "10,Urban,#ff0000\n20,Cropland,#ffff00\n30,Forest,#00aa00".parse().unwrap()
}

/// Three point features with a `crop` column holding A, B and C.
pub fn write_parcels(path: &Path) {
    let text = r#"{
      "type": "FeatureCollection",
      "name": "parcels",
      "features": [
        {"type": "Feature", "id": 1, "geometry": {"type": "Point", "coordinates": [10.0, 50.0]}, "properties": {"crop": "A", "area": 1.5}},
        {"type": "Feature", "id": 2, "geometry": {"type": "Point", "coordinates": [10.5, 50.0]}, "properties": {"crop": "B", "area": 2.0}},
        {"type": "Feature", "id": 3, "geometry": {"type": "Point", "coordinates": [11.0, 50.5]}, "properties": {"crop": "C", "area": 0.25}}
      ]
    }"#;
    std::fs::write(path, text).unwrap();
}
