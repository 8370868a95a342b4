//! GeoJSON feature collections

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use geojson::feature::Id;
use geojson::{GeoJson, JsonObject, JsonValue};

use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};

fn to_attribute(value: JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(b) => AttributeValue::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None if n.is_f64() => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            // integers past i64 keep their exact digits
            None => AttributeValue::Json(JsonValue::Number(n)),
        },
        JsonValue::String(s) => AttributeValue::String(s),
        other => AttributeValue::Json(other),
    }
}

fn to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Bool(b) => JsonValue::Bool(*b),
        AttributeValue::Int(i) => JsonValue::from(*i),
        AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        AttributeValue::String(s) => JsonValue::String(s.clone()),
        AttributeValue::Json(v) => v.clone(),
    }
}

fn convert_feature(feature: geojson::Feature) -> Result<Feature> {
    let geometry = feature
        .geometry
        .as_ref()
        .map(|g| geo_types::Geometry::<f64>::try_from(&g.value))
        .transpose()?;

    let mut out = match geometry {
        Some(g) => Feature::new(g),
        None => Feature::empty(),
    };
    out.geojson_geometry = feature.geometry;
    out.bbox = feature.bbox;
    out.foreign_members = feature.foreign_members.unwrap_or_default();
    out.id = feature.id.map(|id| match id {
        Id::String(s) => AttributeValue::String(s),
        Id::Number(n) => to_attribute(JsonValue::Number(n)),
    });
    for (key, value) in feature.properties.unwrap_or_default() {
        out.set_property(key, to_attribute(value));
    }
    Ok(out)
}

/// Read a GeoJSON file. A lone feature reads as a one-feature collection.
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let parsed: GeoJson = text.parse()?;

    let mut collection = FeatureCollection::new();
    match parsed {
        GeoJson::FeatureCollection(fc) => {
            for feature in fc.features {
                collection.push(convert_feature(feature)?);
            }
            collection.foreign_members = fc.foreign_members.unwrap_or_default();
        }
        GeoJson::Feature(feature) => collection.push(convert_feature(feature)?),
        GeoJson::Geometry(_) => {
            return Err(Error::Vector(format!(
                "{} holds a bare geometry with no attributes",
                path.as_ref().display()
            )))
        }
    }

    tracing::debug!(
        path = %path.as_ref().display(),
        features = collection.len(),
        columns = collection.columns.len(),
        "read GeoJSON"
    );
    Ok(collection)
}

/// Write a feature collection as GeoJSON, keeping ids, bboxes, foreign
/// members and the geometry as it was read.
pub fn write_geojson<P: AsRef<Path>>(path: P, collection: &FeatureCollection) -> Result<()> {
    let features = collection
        .iter()
        .map(|f| {
            let properties: JsonObject = collection
                .columns
                .iter()
                .filter_map(|c| f.get_property(c).map(|v| (c.clone(), to_json(v))))
                .collect();
            let geometry = f.geojson_geometry.clone().or_else(|| {
                f.geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g)))
            });
            geojson::Feature {
                bbox: f.bbox.clone(),
                geometry,
                id: f.id.as_ref().and_then(|id| match to_json(id) {
                    JsonValue::String(s) => Some(Id::String(s)),
                    JsonValue::Number(n) => Some(Id::Number(n)),
                    _ => None,
                }),
                properties: Some(properties),
                foreign_members: if f.foreign_members.is_empty() {
                    None
                } else {
                    Some(f.foreign_members.clone())
                },
            }
        })
        .collect();

    let fc = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: if collection.foreign_members.is_empty() {
            None
        } else {
            Some(collection.foreign_members.clone())
        },
    };

    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer(&mut writer, &fc).map_err(|e| Error::Vector(e.to_string()))?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "name": "parcels",
        "features": [
            {"type": "Feature", "id": 7, "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
             "properties": {"landuse": "A", "area": 12.5}},
            {"type": "Feature", "geometry": null, "properties": {"landuse": null, "area": 3}}
        ]
    }"#;

    #[test]
    fn test_read_write_preserves_table() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("parcels.geojson");
        std::fs::write(&src, SAMPLE).unwrap();

        let fc = read_geojson(&src).unwrap();
        assert_eq!(fc.len(), 2);
        assert_eq!(fc.columns, vec!["area", "landuse"]);
        assert_eq!(fc.features[0].id, Some(AttributeValue::Int(7)));
        assert_eq!(fc.features[1].get_property("area"), Some(&AttributeValue::Int(3)));
        assert!(fc.features[1].geometry.is_none());
        assert_eq!(fc.foreign_members.get("name"), Some(&JsonValue::from("parcels")));

        let out = dir.path().join("copy.geojson");
        write_geojson(&out, &fc).unwrap();
        assert_eq!(read_geojson(&out).unwrap(), fc);
    }

    #[test]
    fn test_write_keeps_elevation_bbox_and_members() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("wells.geojson");
        std::fs::write(
            &src,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "bbox": [10.0, 50.0, 10.0, 50.0], "source": "survey-2019",
                 "geometry": {"type": "Point", "coordinates": [10.0, 50.0, 123.5]},
                 "properties": {"code": 1}}
            ]}"#,
        )
        .unwrap();

        let fc = read_geojson(&src).unwrap();
        let out = dir.path().join("copy.geojson");
        write_geojson(&out, &fc).unwrap();

        let written: JsonValue = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        let feature = &written["features"][0];
        assert_eq!(feature["geometry"]["coordinates"], serde_json::json!([10.0, 50.0, 123.5]));
        assert_eq!(feature["bbox"], serde_json::json!([10.0, 50.0, 10.0, 50.0]));
        assert_eq!(feature["source"], JsonValue::from("survey-2019"));
        assert_eq!(feature["properties"]["code"], JsonValue::from(1));
    }

    #[test]
    fn test_integers_past_i64_keep_their_digits() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("ids.geojson");
        std::fs::write(
            &src,
            r#"{"type": "Feature", "geometry": null,
                "properties": {"parcel": 18446744073709551615, "ratio": 0.5}}"#,
        )
        .unwrap();

        let fc = read_geojson(&src).unwrap();
        let parcel = fc.features[0].get_property("parcel").unwrap();
        assert_eq!(
            parcel.to_source_value(),
            Some(crate::matrix::SourceValue::Text("18446744073709551615".into()))
        );
        assert_eq!(fc.features[0].get_property("ratio"), Some(&AttributeValue::Float(0.5)));

        let out = dir.path().join("copy.geojson");
        write_geojson(&out, &fc).unwrap();
        assert!(std::fs::read_to_string(&out)
            .unwrap()
            .contains("18446744073709551615"));
    }

    #[test]
    fn test_bare_geometry_rejected() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("point.geojson");
        std::fs::write(&src, r#"{"type": "Point", "coordinates": [0.0, 0.0]}"#).unwrap();
        assert!(read_geojson(&src).is_err());
    }
}
