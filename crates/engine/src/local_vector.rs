//! Attribute reclassification of a local vector table

use std::path::Path;

use geoclass_core::io::{read_vector, write_vector};
use geoclass_core::vector::AttributeValue;
use geoclass_core::{Error, Inverse, Result};

use crate::commit::TempOutput;
use crate::histogram::ValueHistogram;

/// What a vector pass did.
#[derive(Debug, Clone)]
pub struct VectorReport {
    pub features: usize,
    /// Column the classes were written to
    pub output_column: String,
    /// Occurrences of each source value
    pub histogram: ValueHistogram,
    /// Features whose source attribute was null or missing
    pub keyless: u64,
}

fn suffix(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Add a class column to every feature of `source` and write `destination`.
///
/// The table is loaded whole. The new column is additive: if
/// `output_column` is already taken, a `_N` suffix is appended. Geometry
/// and every original column are written back unchanged, in the source's
/// format.
pub fn reclassify_vector(
    source: &Path,
    column: &str,
    inverse: &Inverse,
    output_column: &str,
    destination: &Path,
) -> Result<VectorReport> {
    if suffix(source) != suffix(destination) {
        return Err(Error::InvalidParameter {
            name: "destination",
            value: destination.display().to_string(),
            reason: format!(
                "vector outputs keep the source format (.{})",
                suffix(source).unwrap_or_default()
            ),
        });
    }

    let mut collection = read_vector(source)?;
    if !collection.has_column(column) {
        return Err(Error::InvalidParameter {
            name: "column",
            value: column.to_string(),
            reason: format!("{} has columns {:?}", source.display(), collection.columns),
        });
    }

    let output_column = collection.unused_column_name(output_column);
    let mut histogram = ValueHistogram::new();
    let mut keyless = 0;

    for feature in &mut collection.features {
        let key = feature.get_property(column).and_then(AttributeValue::to_source_value);
        let code = match key {
            Some(key) => {
                let code = inverse.get(&key);
                histogram.add(key, 1);
                code
            }
            None => {
                keyless += 1;
                inverse.default_value()
            }
        };
        feature.set_property(output_column.clone(), AttributeValue::Int(code));
    }
    collection.add_column(output_column.clone());

    tracing::info!(
        source = %source.display(),
        column,
        output_column = %output_column,
        features = collection.len(),
        "reclassifying vector table"
    );

    let temp = TempOutput::reserve(destination)?;
    #[cfg(feature = "gdal")]
    if suffix(destination).as_deref() == Some("shp") {
        temp.vacate()?;
    }
    write_vector(temp.path(), &collection)?;
    temp.commit()?;

    Ok(VectorReport {
        features: collection.len(),
        output_column,
        histogram,
        keyless,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoclass_core::io::read_geojson;
    use geoclass_core::Matrix;

    const PARCELS: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0, 0]}, "properties": {"crop": "A", "reclass": 9}},
        {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 0]}, "properties": {"crop": null, "reclass": 9}}
      ]
    }"#;

    #[test]
    fn test_existing_output_column_is_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("parcels.geojson");
        std::fs::write(&src, PARCELS).unwrap();
        let dest = dir.path().join("parcels_reclass.geojson");

        let matrix = Matrix::from_buckets(vec![(1, vec!["A"])], 0);
        let report = reclassify_vector(&src, "crop", matrix.invert(), "reclass", &dest).unwrap();
        assert_eq!(report.output_column, "reclass_1");
        assert_eq!(report.keyless, 1);

        let out = read_geojson(&dest).unwrap();
        let codes: Vec<_> = out.iter().map(|f| f.get_property("reclass_1").cloned()).collect();
        assert_eq!(codes, vec![Some(AttributeValue::Int(1)), Some(AttributeValue::Int(0))]);
        assert!(out.iter().all(|f| f.get_property("reclass") == Some(&AttributeValue::Int(9))));
    }

    #[test]
    fn test_unknown_column_and_format_change() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("parcels.geojson");
        std::fs::write(&src, PARCELS).unwrap();
        let matrix = Matrix::new();

        let err = reclassify_vector(&src, "nope", matrix.invert(), "reclass", &dir.path().join("o.geojson"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "column", .. }));

        let err = reclassify_vector(&src, "crop", matrix.invert(), "reclass", &dir.path().join("o.shp"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "destination", .. }));
        assert!(!dir.path().join("o.tmp.geojson").exists());
    }
}
