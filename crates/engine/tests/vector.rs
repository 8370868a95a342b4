//! Local vector reclassification end to end.

mod common;

use common::{land_cover_classes, write_parcels};
use geoclass_core::io::read_geojson;
use geoclass_core::vector::AttributeValue;
use geoclass_core::{Error, Matrix, SourceDescriptor, Stage};
use geoclass_engine::{default_destination, EngineConfig, ReclassifyExecutor};
use std::collections::BTreeSet;
use tempfile::TempDir;

#[test]
fn test_scenario_b_adds_two_class_column() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("parcels.geojson");
    write_parcels(&src);
    let source = SourceDescriptor::local(src.to_str().unwrap(), "crop").unwrap();
    let dest = default_destination(&source, None).unwrap();
    assert!(dest.ends_with("parcels_reclass.geojson"));

    let matrix = Matrix::from_buckets(vec![(1, vec!["A"]), (2, vec!["B", "C"])], 0);
    let result = ReclassifyExecutor::new(EngineConfig::default())
        .run(&source, &matrix, &land_cover_classes(), &dest)
        .unwrap();
    assert_eq!(result.output_column.as_deref(), Some("reclass"));
    assert_eq!(result.summary.mapped_values, 3);
    assert_eq!(result.summary.destination_codes, 2);
    assert_eq!(result.summary.default_count, Some(0));

    let before = read_geojson(&src).unwrap();
    let after = read_geojson(&dest).unwrap();
    assert_eq!(after.len(), 3);

    let codes: BTreeSet<i64> = after
        .iter()
        .filter_map(|f| match f.get_property("reclass") {
            Some(AttributeValue::Int(code)) => Some(*code),
            _ => None,
        })
        .collect();
    assert_eq!(codes, BTreeSet::from([1, 2]));

    for (old, new) in before.iter().zip(after.iter()) {
        assert_eq!(old.geometry, new.geometry);
        assert_eq!(old.id, new.id);
        assert_eq!(old.get_property("crop"), new.get_property("crop"));
        assert_eq!(old.get_property("area"), new.get_property("area"));
    }
    assert_eq!(after.foreign_members.get("name"), Some(&serde_json::json!("parcels")));
}

#[test]
fn test_unmapped_and_null_attributes_take_default() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("zones.geojson");
    std::fs::write(
        &src,
        r#"{"type":"FeatureCollection","features":[
          {"type":"Feature","geometry":null,"properties":{"zone":11}},
          {"type":"Feature","geometry":null,"properties":{"zone":12.0}},
          {"type":"Feature","geometry":null,"properties":{"zone":13}},
          {"type":"Feature","geometry":null,"properties":{"zone":null}},
          {"type":"Feature","geometry":null,"properties":{}}
        ]}"#,
    )
    .unwrap();
    let dest = dir.path().join("zones_out.geojson");

    let source = SourceDescriptor::local(src.to_str().unwrap(), "zone").unwrap();
    let matrix = Matrix::from_buckets(vec![(5, vec![11i64, 12])], 9);
    let result = ReclassifyExecutor::new(EngineConfig {
        output_column: "class".into(),
        ..EngineConfig::default()
    })
    .run(&source, &matrix, &land_cover_classes(), dest.to_str().unwrap())
    .unwrap();

    let out = read_geojson(&dest).unwrap();
    let codes: Vec<Option<&AttributeValue>> = out.iter().map(|f| f.get_property("class")).collect();
    let expected = [5, 5, 9, 9, 9].map(AttributeValue::Int);
    assert_eq!(codes, expected.iter().map(Some).collect::<Vec<_>>());
    assert_eq!(result.summary.unmapped_values, 1);
    assert_eq!(result.summary.default_count, Some(3));
}

#[test]
fn test_unknown_column_is_a_validation_error() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("parcels.geojson");
    write_parcels(&src);
    let dest = dir.path().join("out.geojson");

    let source = SourceDescriptor::local(src.to_str().unwrap(), "landuse").unwrap();
    let err = ReclassifyExecutor::new(EngineConfig::default())
        .run(&source, &Matrix::new(), &land_cover_classes(), dest.to_str().unwrap())
        .unwrap_err();
    assert_eq!(err.stage, Stage::Validate);
    assert!(matches!(err.error, Error::InvalidParameter { name: "column", .. }));
    assert!(!dest.exists());
}
