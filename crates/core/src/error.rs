//! Error types for GeoClass

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::matrix::SourceValue;

/// Main error type for GeoClass operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("unrecognized source {location}: {reason}")]
    UnrecognizedSource { location: String, reason: String },

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("backend timed out after {timeout:?} during {operation}")]
    BackendTimeout { operation: String, timeout: Duration },

    #[error("source value {0} is not present in the enumerated source classes")]
    UnknownSourceValue(SourceValue),

    #[error("source value {value} is assigned to both class {first} and class {second}")]
    DuplicateAssignment {
        value: SourceValue,
        first: i64,
        second: i64,
    },

    #[error("class code {code} does not fit the output pixel type (0..={max})")]
    ClassCodeRange { code: i64, max: i64 },

    #[error("unsupported pixel type: {0}")]
    UnsupportedPixelType(String),

    #[error("partial write to {}: {reason}", path.display())]
    PartialWrite { path: PathBuf, reason: String },

    #[error("invalid class table: {0}")]
    InvalidClassTable(String),

    #[error("class table has no entries")]
    EmptyClassTable,

    #[error("invalid reclassification matrix: {0}")]
    InvalidMatrix(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("vector error: {0}")]
    Vector(String),

    #[error("GDAL error: {0}")]
    #[cfg(feature = "gdal")]
    Gdal(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(e: gdal::errors::GdalError) -> Self {
        Error::Gdal(e.to_string())
    }
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        Error::Tiff(e.to_string())
    }
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::Vector(e.to_string())
    }
}

/// Result type alias for GeoClass operations
pub type Result<T> = std::result::Result<T, Error>;

/// The step of a reclassification session an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Detect,
    Enumerate,
    Validate,
    Transform,
    Commit,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Detect => "detect",
            Stage::Enumerate => "enumerate",
            Stage::Validate => "validate",
            Stage::Transform => "transform",
            Stage::Commit => "commit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An [`Error`] tagged with the source it concerns and the stage that failed.
///
/// This is what the public entry points of the engine return, so a user can act
/// on a failure without digging into which strategy produced it.
#[derive(Error, Debug)]
#[error("{stage} failed for {source_id}: {error}")]
pub struct ReclassifyError {
    pub source_id: String,
    pub stage: Stage,
    #[source]
    pub error: Error,
}

impl ReclassifyError {
    pub fn new(source_id: impl Into<String>, stage: Stage, error: Error) -> Self {
        Self {
            source_id: source_id.into(),
            stage,
            error,
        }
    }

    /// Whether the failure was caught before anything was written.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.error,
            Error::UnknownSourceValue(_)
                | Error::DuplicateAssignment { .. }
                | Error::ClassCodeRange { .. }
                | Error::UnsupportedPixelType(_)
                | Error::EmptyClassTable
                | Error::InvalidClassTable(_)
                | Error::InvalidMatrix(_)
        )
    }
}

/// Attach a source identifier and stage to a fallible result.
pub trait StageContext<T> {
    fn at_stage(self, source_id: &str, stage: Stage) -> std::result::Result<T, ReclassifyError>;
}

impl<T> StageContext<T> for Result<T> {
    fn at_stage(self, source_id: &str, stage: Stage) -> std::result::Result<T, ReclassifyError> {
        self.map_err(|e| ReclassifyError::new(source_id, stage, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reclassify_error_display_names_source_and_stage() {
        let err = ReclassifyError::new(
            "landcover.tif",
            Stage::Validate,
            Error::ClassCodeRange { code: 300, max: 255 },
        );
        let msg = err.to_string();
        assert!(msg.starts_with("validate failed for landcover.tif"));
        assert!(msg.contains("300"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_stage_context() {
        let res: Result<()> = Err(Error::Cancelled);
        let err = res.at_stage("a.tif", Stage::Transform).unwrap_err();
        assert_eq!(err.stage, Stage::Transform);
        assert!(!err.is_validation());
    }
}
