//! # GeoClass Engine
//!
//! Reclassifies a raster band or a vector attribute column through a
//! many-to-one matrix, on local files or on a remote compute backend.
//!
//! - [`detect`] / [`describe`]: classify a location into a [`SourceKind`]
//! - [`enumerate`]: the distinct values a matrix author picks from
//! - [`ReclassifyExecutor`]: validate, dispatch and summarize a run
//! - [`WindowedRasterTransform`]: bounded-memory block remap of local rasters
//! - [`wait_for_job`]: follow a remote export to completion
//!
//! ```no_run
//! use geoclass_core::{ClassTable, Matrix};
//! use geoclass_engine::{describe, EngineConfig, ReclassifyExecutor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = describe("landcover.tif", "1", None)?;
//! let classes = ClassTable::load("classes.csv")?;
//! let matrix = Matrix::load("matrix.csv", 0)?;
//!
//! let result = ReclassifyExecutor::new(EngineConfig::default())
//!     .run(&source, &matrix, &classes, "landcover_reclass.tif")?;
//! println!("{} ({} values mapped)", result.output, result.summary.mapped_values);
//! # Ok(())
//! # }
//! ```
//!
//! [`SourceKind`]: geoclass_core::SourceKind

pub mod cancel;
pub mod commit;
pub mod config;
pub mod detect;
pub mod enumerate;
pub mod executor;
pub mod histogram;
pub mod jobs;
pub mod local_raster;
pub mod local_vector;
pub mod lookup;
pub mod naming;
pub mod remote;

pub use cancel::CancelToken;
pub use config::EngineConfig;
pub use detect::{describe, detect, list_bands};
pub use enumerate::enumerate;
pub use executor::{ExecResult, Output, ReclassifyExecutor};
pub use histogram::{MatrixSummary, ValueHistogram};
pub use jobs::{cancel_job, wait_for_job, WaitOptions};
pub use local_raster::{RasterReport, TransformState, WindowedRasterTransform};
pub use local_vector::{reclassify_vector, VectorReport};
pub use lookup::LookupTable;
pub use naming::default_destination;
pub use remote::{reclassify_remote_collection, reclassify_remote_image};
