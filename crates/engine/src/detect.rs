//! Source type detection and band/column listing

use std::cmp::Ordering;
use std::path::Path;

use geoclass_cloud::{AssetKind, CloudError, SessionProvider};
use geoclass_core::io::{open_raster, read_vector};
use geoclass_core::source::{RASTER_SUFFIXES, VECTOR_SUFFIXES};
use geoclass_core::{
    BandOrColumn, Error, ReclassifyError, Result, SourceDescriptor, SourceKind, Stage, StageContext,
};

/// Table properties the backend adds to every feature.
const SYSTEM_COLUMNS: &[&str] = &["system:index", "Shape_Area"];

fn has_known_suffix(location: &str) -> bool {
    Path::new(location)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| RASTER_SUFFIXES.contains(&e.as_str()) || VECTOR_SUFFIXES.contains(&e.as_str()))
}

/// Whether `location` names a local file rather than a remote asset.
pub fn is_local(location: &str) -> bool {
    has_known_suffix(location) || Path::new(location).exists()
}

/// Classify `location` into one of the four source kinds.
///
/// Local files are classified by suffix. Anything else is looked up on the
/// backend, which blocks on a network round trip.
pub fn detect(location: &str, session: Option<&dyn SessionProvider>) -> Result<SourceKind> {
    if is_local(location) {
        return SourceKind::from_path(location);
    }

    let session = session.ok_or_else(|| {
        Error::BackendUnavailable(format!("{location} is not a local file and no remote session is configured"))
    })?;
    let kind = match session.asset_kind(location) {
        Ok(kind) => kind,
        Err(CloudError::NotFound(_)) => {
            return Err(Error::UnrecognizedSource {
                location: location.to_string(),
                reason: "no such file or remote asset".to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    tracing::debug!(location, asset_kind = %kind, "remote asset type");

    match kind {
        AssetKind::Image => Ok(SourceKind::RemoteImage),
        AssetKind::Table => Ok(SourceKind::RemoteFeatureCollection),
        other => Err(Error::UnrecognizedSource {
            location: location.to_string(),
            reason: format!("asset type {other} is neither IMAGE nor TABLE"),
        }),
    }
}

/// Detect `location` and pair it with the band or column to read.
///
/// Only local rasters address bands by number; for every other kind
/// `band_or_column` is taken as a name verbatim.
pub fn describe(
    location: &str,
    band_or_column: &str,
    session: Option<&dyn SessionProvider>,
) -> std::result::Result<SourceDescriptor, ReclassifyError> {
    let kind = detect(location, session).at_stage(location, Stage::Detect)?;
    let selector = match kind {
        SourceKind::LocalRaster => BandOrColumn::parse(band_or_column),
        _ => BandOrColumn::Name(band_or_column.trim().to_string()),
    };
    Ok(SourceDescriptor::new(kind, location, selector))
}

/// Bands or attribute columns a user can pick for `location`, naturally sorted.
pub fn list_bands(
    kind: SourceKind,
    location: &str,
    session: Option<&dyn SessionProvider>,
) -> Result<Vec<String>> {
    let mut names = match kind {
        SourceKind::LocalRaster => {
            let reader = open_raster(location)?;
            (1..=reader.info().band_count).map(|b| b.to_string()).collect()
        }
        SourceKind::LocalVector => read_vector(location)?.columns,
        SourceKind::RemoteImage | SourceKind::RemoteFeatureCollection => {
            let session = session.ok_or_else(|| {
                Error::BackendUnavailable("listing remote bands needs a remote session".to_string())
            })?;
            let mut names = session.list_bands(location)?;
            if kind == SourceKind::RemoteFeatureCollection {
                names.retain(|n| !SYSTEM_COLUMNS.contains(&n.as_str()));
            }
            names
        }
    };
    names.sort_by(|a, b| natural_cmp(a, b));
    Ok(names)
}

/// Compare strings with runs of digits ordered by numeric value.
///
/// `"b2"` sorts before `"b10"`; ties between equal numbers fall back to the
/// shorter run so `"b2"` precedes `"b02"`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();
    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left = take_digits(&mut a);
                let right = take_digits(&mut b);
                let l = left.trim_start_matches('0');
                let r = right.trim_start_matches('0');
                let ord = l
                    .len()
                    .cmp(&r.len())
                    .then_with(|| l.cmp(r))
                    .then_with(|| left.len().cmp(&right.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        run.push(c);
        chars.next();
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoclass_cloud::InMemorySession;
    use serde_json::json;

    #[test]
    fn test_local_suffixes_need_no_session() {
        assert_eq!(detect("lc.tif", None).unwrap(), SourceKind::LocalRaster);
        assert_eq!(detect("mosaic.VRT", None).unwrap(), SourceKind::LocalRaster);
        assert_eq!(detect("parcels.geojson", None).unwrap(), SourceKind::LocalVector);
    }

    #[test]
    fn test_existing_file_with_unknown_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "x").unwrap();
        let err = detect(path.to_str().unwrap(), None).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedSource { .. }));
    }

    #[test]
    fn test_remote_detection() {
        let session = InMemorySession::new();
        session.add_image("users/me/lc", vec![("b1", vec![1])], Some(30.0));
        let row = match json!({"crop": "A"}) {
            serde_json::Value::Object(m) => m,
            _ => unreachable!(),
        };
        session.add_table("users/me/fields", vec![row]);

        assert_eq!(detect("users/me/lc", Some(&session)).unwrap(), SourceKind::RemoteImage);
        assert_eq!(
            detect("users/me/fields", Some(&session)).unwrap(),
            SourceKind::RemoteFeatureCollection
        );
        assert!(matches!(
            detect("users/me", Some(&session)),
            Err(Error::UnrecognizedSource { .. })
        ));
        assert!(matches!(
            detect("users/me/nothing", Some(&session)),
            Err(Error::UnrecognizedSource { .. })
        ));
        assert!(matches!(detect("users/me/lc", None), Err(Error::BackendUnavailable(_))));

        session.set_offline(true);
        assert!(matches!(
            detect("users/me/lc", Some(&session)),
            Err(Error::BackendUnavailable(_))
        ));
    }

    #[test]
    fn test_describe_tags_detect_stage() {
        let err = describe("users/me/lc", "b1", None).unwrap_err();
        assert_eq!(err.stage, Stage::Detect);
        assert_eq!(err.source_id, "users/me/lc");

        let desc = describe("lc.tif", "2", None).unwrap();
        assert_eq!(desc.band_or_column, BandOrColumn::Band(2));
        let desc = describe("parcels.geojson", "2", None).unwrap();
        assert_eq!(desc.band_or_column, BandOrColumn::Name("2".into()));
    }

    #[test]
    fn test_remote_table_columns_hide_system_properties() {
        let session = InMemorySession::new();
        let row = match json!({"system:index": "0", "Shape_Area": 1.5, "zone10": 1, "zone2": 2}) {
            serde_json::Value::Object(m) => m,
            _ => unreachable!(),
        };
        session.add_table("users/me/fields", vec![row]);
        let names = list_bands(SourceKind::RemoteFeatureCollection, "users/me/fields", Some(&session)).unwrap();
        assert_eq!(names, vec!["zone2", "zone10"]);
    }

    #[test]
    fn test_natural_order() {
        let mut names = vec!["b10", "b2", "B1", "b1", "b02"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["B1", "b1", "b2", "b02", "b10"]);
        assert_eq!(natural_cmp("10", "9"), Ordering::Greater);
    }
}
