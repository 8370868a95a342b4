//! Distinct source values of a band or column

use std::collections::BTreeSet;
use std::path::Path;

use geoclass_cloud::SessionProvider;
use geoclass_core::io::read_vector;
use geoclass_core::vector::AttributeValue;
use geoclass_core::{Error, ReclassifyError, Result, SourceDescriptor, SourceKind, SourceValue, Stage, StageContext};

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::local_raster::band_histogram;

/// The values a matrix author picks from, ascending.
///
/// Local rasters are scanned block by block with the same windowing as the
/// transform; vector tables are loaded whole; remote sources cost one
/// blocking round trip each.
pub fn enumerate(
    source: &SourceDescriptor,
    session: Option<&dyn SessionProvider>,
    config: &EngineConfig,
) -> std::result::Result<Vec<SourceValue>, ReclassifyError> {
    let values = distinct_values(source, session, config, &CancelToken::new()).at_stage(&source.location, Stage::Enumerate)?;
    Ok(values.into_iter().collect())
}

pub(crate) fn distinct_values(
    source: &SourceDescriptor,
    session: Option<&dyn SessionProvider>,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<BTreeSet<SourceValue>> {
    let values = match source.kind {
        SourceKind::LocalRaster => {
            let band = source.band_or_column.band_index()?;
            band_histogram(Path::new(&source.location), band, config, cancel)?.values()
        }
        SourceKind::LocalVector => column_values(Path::new(&source.location), &source.band_or_column.name())?,
        SourceKind::RemoteImage | SourceKind::RemoteFeatureCollection => {
            let session = session.ok_or_else(|| {
                Error::BackendUnavailable(format!("enumerating {} needs a remote session", source.kind))
            })?;
            session.enumerate_remote(&source.location, &source.band_or_column.name())?
        }
    };
    tracing::info!(source = %source.location, kind = %source.kind, values = values.len(), "enumerated source values");
    Ok(values)
}

fn column_values(path: &Path, column: &str) -> Result<BTreeSet<SourceValue>> {
    let collection = read_vector(path)?;
    if !collection.has_column(column) {
        return Err(Error::InvalidParameter {
            name: "column",
            value: column.to_string(),
            reason: format!("{} has columns {:?}", path.display(), collection.columns),
        });
    }
    Ok(collection
        .iter()
        .filter_map(|f| f.get_property(column).and_then(AttributeValue::to_source_value))
        .collect())
}
