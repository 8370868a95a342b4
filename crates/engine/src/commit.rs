//! Temporary outputs renamed into place after a complete pass.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use geoclass_core::{Error, Result};

/// Files a shapefile is spread across besides the `.shp` itself.
const SHAPEFILE_SIDECARS: &[&str] = &["shx", "dbf", "prj", "cpg"];

/// Sibling of `destination` used while it is being written.
///
/// `landcover_reclass.tif` → `landcover_reclass.tmp.tif`; the extension is
/// kept so format detection by suffix still works on the temporary file.
pub fn temp_path_for(destination: &Path) -> PathBuf {
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match destination.extension() {
        Some(ext) => format!("{stem}.tmp.{}", ext.to_string_lossy()),
        None => format!("{stem}.tmp"),
    };
    destination.with_file_name(name)
}

/// A reserved temporary output.
///
/// Dropping it without [`TempOutput::commit`] removes whatever was written,
/// so a failed or cancelled run never leaves a partial file behind.
#[derive(Debug)]
pub struct TempOutput {
    destination: PathBuf,
    temp: PathBuf,
    sidecars: &'static [&'static str],
    committed: bool,
}

impl TempOutput {
    /// Reserve the temporary sibling of `destination`.
    ///
    /// The sibling is created exclusively: if another run is already writing
    /// the same destination this fails instead of interleaving writes.
    pub fn reserve(destination: &Path) -> Result<Self> {
        let temp = temp_path_for(destination);
        match OpenOptions::new().write(true).create_new(true).open(&temp) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::InvalidParameter {
                    name: "destination",
                    value: destination.display().to_string(),
                    reason: format!("{} exists; another run may be writing it", temp.display()),
                })
            }
            Err(e) => return Err(e.into()),
        }

        let is_shapefile = destination
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("shp"));
        tracing::debug!(temp = %temp.display(), "reserved temporary output");

        Ok(Self {
            destination: destination.to_path_buf(),
            temp,
            sidecars: if is_shapefile { SHAPEFILE_SIDECARS } else { &[] },
            committed: false,
        })
    }

    /// Where the strategy should write.
    pub fn path(&self) -> &Path {
        &self.temp
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Remove the empty placeholder for writers that refuse to overwrite.
    #[cfg_attr(not(feature = "gdal"), allow(dead_code))]
    pub(crate) fn vacate(&self) -> Result<()> {
        match fs::remove_file(&self.temp) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Rename the temporary output (and its sidecars) onto the destination.
    ///
    /// The main file moves first. If a sidecar cannot follow, the files
    /// already moved go back to their temporary names.
    pub fn commit(mut self) -> Result<PathBuf> {
        let mut moves = vec![(self.temp.clone(), self.destination.clone())];
        moves.extend(
            self.sidecars
                .iter()
                .map(|ext| (self.temp.with_extension(ext), self.destination.with_extension(ext)))
                .filter(|(from, _)| from.exists()),
        );

        for (done, (from, to)) in moves.iter().enumerate() {
            if let Err(e) = self.rename(from, to) {
                for (back_from, back_to) in moves[..done].iter().rev() {
                    if let Err(undo) = fs::rename(back_to, back_from) {
                        tracing::warn!(path = %back_to.display(), error = %undo, "cannot roll back committed file");
                    }
                }
                return Err(e);
            }
        }
        self.committed = true;
        tracing::debug!(destination = %self.destination.display(), "committed output");
        Ok(self.destination.clone())
    }
}

impl TempOutput {
    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).map_err(|e| Error::PartialWrite {
            path: self.destination.clone(),
            reason: format!("cannot move {} into place: {e}", from.display()),
        })
    }
}

impl Drop for TempOutput {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let files = std::iter::once(self.temp.clone())
            .chain(self.sidecars.iter().map(|ext| self.temp.with_extension(ext)));
        for file in files {
            match fs::remove_file(&file) {
                Ok(()) => tracing::debug!(path = %file.display(), "removed temporary output"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %file.display(), error = %e, "cannot remove temporary output"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_keeps_extension() {
        assert_eq!(
            temp_path_for(Path::new("/data/lc_reclass.tif")),
            PathBuf::from("/data/lc_reclass.tmp.tif")
        );
        assert_eq!(
            temp_path_for(Path::new("parcels.geojson")),
            PathBuf::from("parcels.tmp.geojson")
        );
    }

    #[test]
    fn test_drop_removes_uncommitted() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.tif");
        let temp_path = {
            let temp = TempOutput::reserve(&dest).unwrap();
            fs::write(temp.path(), b"partial").unwrap();
            temp.path().to_path_buf()
        };
        assert!(!temp_path.exists());
        assert!(!dest.exists());
    }

    #[test]
    fn test_commit_renames() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.geojson");
        fs::write(&dest, b"old").unwrap();

        let temp = TempOutput::reserve(&dest).unwrap();
        fs::write(temp.path(), b"new").unwrap();
        let committed = temp.commit().unwrap();

        assert_eq!(committed, dest);
        assert_eq!(fs::read(&dest).unwrap(), b"new");
        assert!(!temp_path_for(&dest).exists());
    }

    #[test]
    fn test_second_reservation_fails() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.tif");
        let _first = TempOutput::reserve(&dest).unwrap();
        let err = TempOutput::reserve(&dest).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "destination", .. }));
    }

    #[test]
    fn test_shapefile_sidecars_follow() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("parcels.shp");
        let temp = TempOutput::reserve(&dest).unwrap();
        fs::write(temp.path().with_extension("dbf"), b"table").unwrap();
        temp.commit().unwrap();
        assert!(dir.path().join("parcels.dbf").exists());
        assert!(dest.exists());
    }

    #[test]
    fn test_failed_sidecar_rolls_back_shapefile() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("parcels.shp");
        // a directory in the way of the .prj makes that rename fail
        fs::create_dir(dir.path().join("parcels.prj")).unwrap();
        fs::write(dir.path().join("parcels.prj").join("keep"), b"x").unwrap();

        let temp = TempOutput::reserve(&dest).unwrap();
        fs::write(temp.path(), b"shapes").unwrap();
        fs::write(temp.path().with_extension("dbf"), b"table").unwrap();
        fs::write(temp.path().with_extension("prj"), b"crs").unwrap();
        let temp_path = temp.path().to_path_buf();

        let err = temp.commit().unwrap_err();
        assert!(matches!(err, Error::PartialWrite { .. }));
        assert!(!dest.exists());
        assert!(!dir.path().join("parcels.dbf").exists());
        assert!(!temp_path.exists());
        assert!(!temp_path.with_extension("dbf").exists());
    }
}
