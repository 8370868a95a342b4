//! Default output locations

use std::path::Path;

use geoclass_cloud::naming::{asset_folder, asset_stem, RECLASS_SUFFIX};
use geoclass_cloud::{unique_asset_id, SessionProvider};
use geoclass_core::{Error, Result, SourceDescriptor, SourceKind};

/// Where a run writes when the caller names no destination.
///
/// Local rasters become `<dir>/<stem>_reclass.tif`, local vectors keep their
/// suffix, and remote outputs land next to the source under a name no
/// existing asset in that folder uses.
pub fn default_destination(source: &SourceDescriptor, session: Option<&dyn SessionProvider>) -> Result<String> {
    match source.kind {
        SourceKind::LocalRaster | SourceKind::LocalVector => {
            let path = Path::new(&source.location);
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| Error::InvalidParameter {
                    name: "source",
                    value: source.location.clone(),
                    reason: "path has no file name".to_string(),
                })?;
            let ext = match source.kind {
                SourceKind::LocalRaster => "tif".to_string(),
                _ => path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("geojson")
                    .to_string(),
            };
            let file = format!("{stem}{RECLASS_SUFFIX}.{ext}");
            Ok(path.with_file_name(file).to_string_lossy().into_owned())
        }
        SourceKind::RemoteImage | SourceKind::RemoteFeatureCollection => {
            let session = session.ok_or_else(|| {
                Error::BackendUnavailable("naming a remote output needs a remote session".to_string())
            })?;
            let folder = asset_folder(&source.location);
            Ok(unique_asset_id(session, folder, asset_stem(&source.location))?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoclass_cloud::InMemorySession;

    #[test]
    fn test_local_defaults() {
        let raster = SourceDescriptor::local("data/lc.vrt", 1).unwrap();
        assert_eq!(default_destination(&raster, None).unwrap(), "data/lc_reclass.tif");

        let vector = SourceDescriptor::local("data/parcels.geojson", "crop").unwrap();
        assert_eq!(default_destination(&vector, None).unwrap(), "data/parcels_reclass.geojson");
    }

    #[test]
    fn test_remote_default_is_unique() {
        let session = InMemorySession::new();
        session.add_image("users/me/lc", vec![("b1", vec![1])], None);
        session.add_image("users/me/lc_reclass", vec![("remapped", vec![1])], None);
        session.add_image("users/me/lc_reclass_1", vec![("remapped", vec![1])], None);

        let source = SourceDescriptor::new(SourceKind::RemoteImage, "users/me/lc", "b1");
        assert_eq!(
            default_destination(&source, Some(&session)).unwrap(),
            "users/me/lc_reclass_2"
        );
    }
}
