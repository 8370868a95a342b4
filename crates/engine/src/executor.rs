//! Dispatch of a reclassification to one of the four backend strategies

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use geoclass_cloud::{JobReference, SessionProvider};
use geoclass_core::{
    ClassTable, Error, Matrix, ReclassifyError, Result, SourceDescriptor, SourceKind, SourceValue, Stage,
    StageContext,
};
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::enumerate::distinct_values;
use crate::histogram::MatrixSummary;
use crate::local_raster::{RasterReport, WindowedRasterTransform};
use crate::local_vector::reclassify_vector;
use crate::remote::{reclassify_remote_collection, reclassify_remote_image};

/// Where the result of a run lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Output {
    /// A local file, fully written and closed
    File(PathBuf),
    /// A remote export that may still be running
    Job(JobReference),
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::File(path) => write!(f, "{}", path.display()),
            Output::Job(job) => write!(f, "job {job}"),
        }
    }
}

/// Outcome of [`ReclassifyExecutor::run`].
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub kind: SourceKind,
    pub output: Output,
    pub summary: MatrixSummary,
    /// Column added to vector outputs
    pub output_column: Option<String>,
    /// Block statistics of a local raster run
    pub raster: Option<RasterReport>,
}

type ProgressFn<'a> = Box<dyn FnMut(usize, usize) + 'a>;

/// Runs a frozen matrix against one source.
///
/// The executor validates before anything is written, picks the strategy
/// from the source kind and tags every failure with the source and stage.
pub struct ReclassifyExecutor<'a> {
    config: EngineConfig,
    session: Option<&'a dyn SessionProvider>,
    cancel: CancelToken,
    progress: Option<ProgressFn<'a>>,
}

impl fmt::Debug for ReclassifyExecutor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReclassifyExecutor")
            .field("config", &self.config)
            .field("remote", &self.session.is_some())
            .finish()
    }
}

impl<'a> ReclassifyExecutor<'a> {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            session: None,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    /// Backend used for remote sources.
    pub fn with_session(mut self, session: &'a dyn SessionProvider) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Report `(blocks_done, blocks_total)` while a local raster is written.
    pub fn with_progress(mut self, progress: impl FnMut(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reclassify `source` through `matrix` into `destination`.
    ///
    /// Local outputs are complete when this returns; remote outputs are
    /// exports the caller has to monitor.
    pub fn run(
        &mut self,
        source: &SourceDescriptor,
        matrix: &Matrix,
        class_table: &ClassTable,
        destination: &str,
    ) -> std::result::Result<ExecResult, ReclassifyError> {
        let id = source.location.as_str();
        tracing::info!(source = id, kind = %source.kind, destination, strict = self.config.strict, "reclassification started");

        self.preflight(matrix, class_table, destination).at_stage(id, Stage::Validate)?;

        let enumerated = if self.config.strict {
            let values = distinct_values(source, self.session, &self.config, &self.cancel).at_stage(id, Stage::Enumerate)?;
            matrix.validate(&values).at_stage(id, Stage::Validate)?;
            Some(values)
        } else {
            None
        };

        let result = match source.kind {
            SourceKind::LocalRaster => self.run_raster(source, matrix, class_table, destination)?,
            SourceKind::LocalVector => self.run_vector(source, matrix, destination)?,
            SourceKind::RemoteImage | SourceKind::RemoteFeatureCollection => {
                self.run_remote(source, matrix, class_table, destination, enumerated.as_ref())?
            }
        };

        tracing::info!(
            source = id,
            output = %result.output,
            mapped = result.summary.mapped_values,
            unmapped = result.summary.unmapped_values,
            "reclassification finished"
        );
        Ok(result)
    }

    fn preflight(&self, matrix: &Matrix, class_table: &ClassTable, destination: &str) -> Result<()> {
        self.config.validate()?;
        class_table.ensure_usable()?;
        matrix.check_assignments()?;
        if destination.trim().is_empty() {
            return Err(Error::InvalidParameter {
                name: "destination",
                value: destination.to_string(),
                reason: "no output location given".to_string(),
            });
        }
        Ok(())
    }

    fn run_raster(
        &mut self,
        source: &SourceDescriptor,
        matrix: &Matrix,
        class_table: &ClassTable,
        destination: &str,
    ) -> std::result::Result<ExecResult, ReclassifyError> {
        let band = source.band_or_column.band_index().at_stage(&source.location, Stage::Validate)?;
        let inverse = matrix.invert();

        let mut transform = WindowedRasterTransform::new(&self.config).with_cancel(self.cancel.clone());
        if let Some(progress) = self.progress.as_mut() {
            transform = transform.with_progress(|done, total| progress(done, total));
        }
        let report = transform.run(
            Path::new(&source.location),
            band,
            inverse,
            class_table,
            Path::new(destination),
        )?;

        Ok(ExecResult {
            kind: source.kind,
            output: Output::File(PathBuf::from(destination)),
            summary: MatrixSummary::from_counts(inverse, &report.histogram, 0),
            output_column: None,
            raster: Some(report),
        })
    }

    fn run_vector(
        &self,
        source: &SourceDescriptor,
        matrix: &Matrix,
        destination: &str,
    ) -> std::result::Result<ExecResult, ReclassifyError> {
        let inverse = matrix.invert();
        let report = reclassify_vector(
            Path::new(&source.location),
            &source.band_or_column.name(),
            inverse,
            &self.config.output_column,
            Path::new(destination),
        )
        .map_err(|e| {
            let stage = match e {
                Error::PartialWrite { .. } => Stage::Commit,
                Error::InvalidParameter { .. } => Stage::Validate,
                _ => Stage::Transform,
            };
            ReclassifyError::new(&source.location, stage, e)
        })?;

        Ok(ExecResult {
            kind: source.kind,
            output: Output::File(PathBuf::from(destination)),
            summary: MatrixSummary::from_counts(inverse, &report.histogram, report.keyless),
            output_column: Some(report.output_column),
            raster: None,
        })
    }

    fn run_remote(
        &self,
        source: &SourceDescriptor,
        matrix: &Matrix,
        class_table: &ClassTable,
        destination: &str,
        enumerated: Option<&BTreeSet<SourceValue>>,
    ) -> std::result::Result<ExecResult, ReclassifyError> {
        let id = source.location.as_str();
        let session = self
            .session
            .ok_or_else(|| Error::BackendUnavailable(format!("{} sources need a remote session", source.kind)))
            .at_stage(id, Stage::Transform)?;
        let inverse = matrix.invert();
        let selector = source.band_or_column.name();

        let (job, output_column) = match source.kind {
            SourceKind::RemoteImage => {
                let job = reclassify_remote_image(session, id, &selector, inverse, class_table, destination);
                (job, None)
            }
            _ => {
                let column = self.config.output_column.clone();
                let job = reclassify_remote_collection(session, id, &selector, inverse, &column, destination);
                (job, Some(column))
            }
        };
        let job = job.at_stage(id, Stage::Transform)?;
        tracing::info!(source = id, job = %job.id, destination, "export submitted");

        Ok(ExecResult {
            kind: source.kind,
            output: Output::Job(job),
            summary: MatrixSummary::from_matrix(inverse, enumerated),
            output_column,
            raster: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ClassTable {
        "1,Forest,#00ff00\n2,Water,#0000ff".parse().unwrap()
    }

    #[test]
    fn test_empty_destination_rejected() {
        let source = SourceDescriptor::local("lc.tif", 1).unwrap();
        let matrix = Matrix::from_buckets(vec![(1, vec![1i64])], 0);
        let err = ReclassifyExecutor::new(EngineConfig::default())
            .run(&source, &matrix, &table(), " ")
            .unwrap_err();
        assert_eq!(err.stage, Stage::Validate);
    }

    #[test]
    fn test_empty_class_table_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.tif");
        let source = SourceDescriptor::local("missing.tif", 1).unwrap();
        let matrix = Matrix::from_buckets(vec![(1, vec![1i64])], 0);
        let err = ReclassifyExecutor::new(EngineConfig::default())
            .run(&source, &matrix, &ClassTable::default(), dest.to_str().unwrap())
            .unwrap_err();
        assert_eq!(err.stage, Stage::Validate);
        assert!(matches!(err.error, Error::EmptyClassTable));
        assert!(!dest.exists());
    }

    #[test]
    fn test_remote_without_session() {
        let source = SourceDescriptor::new(SourceKind::RemoteImage, "users/me/lc", "b1");
        let matrix = Matrix::from_buckets(vec![(1, vec![1i64])], 0);
        let err = ReclassifyExecutor::new(EngineConfig::default())
            .run(&source, &matrix, &table(), "users/me/out")
            .unwrap_err();
        assert_eq!(err.stage, Stage::Transform);
        assert!(matches!(err.error, Error::BackendUnavailable(_)));
    }

    #[test]
    fn test_output_display() {
        let out = Output::File(PathBuf::from("a/b.tif"));
        assert_eq!(out.to_string(), "a/b.tif");
    }
}
