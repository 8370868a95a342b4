//! Server-side reclassification of remote images and feature collections
//!
//! Both strategies build one request from the inverted matrix, submit an
//! export and return the job reference right away; the export itself runs
//! asynchronously on the backend.

use geoclass_cloud::naming::asset_stem;
use geoclass_cloud::{ExportOptions, JobReference, LookupExpression, SessionProvider};
use geoclass_colormap::CategoricalPalette;
use geoclass_core::{ClassTable, Error, Inverse, Result, SourceValue};

/// Image-level properties that style the remapped band as categorical.
pub fn visualization_properties(
    class_table: &ClassTable,
    band: &str,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    let vis = CategoricalPalette::from_class_table(class_table).visualization(band);
    match serde_json::to_value(vis) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::Other(format!("visualization properties serialized as {other}"))),
        Err(e) => Err(Error::Other(e.to_string())),
    }
}

/// Remap `band` of an image asset and export it to `destination`.
pub fn reclassify_remote_image(
    session: &dyn SessionProvider,
    asset_id: &str,
    band: &str,
    inverse: &Inverse,
    class_table: &ClassTable,
    destination: &str,
) -> Result<JobReference> {
    let (from, to): (Vec<i64>, Vec<i64>) = inverse
        .iter()
        .filter_map(|(value, code)| match value {
            SourceValue::Int(v) => Some((*v, code)),
            SourceValue::Text(text) => {
                tracing::warn!(value = %text, "text source value cannot match image pixels, skipped");
                None
            }
        })
        .unzip();
    let properties = visualization_properties(class_table, band)?;

    tracing::info!(asset = asset_id, band, pairs = from.len(), destination, "submitting remote image remap");
    let remapped = session.remap_remote_image(asset_id, band, &from, &to, inverse.default_value())?;
    let styled = session.set_image_properties(&remapped, &properties)?;

    let options = ExportOptions::categorical_image(asset_stem(destination), styled.nominal_scale);
    Ok(session.export(&styled, destination, &options)?)
}

/// Add `output_column` to every feature of a table asset and export it.
pub fn reclassify_remote_collection(
    session: &dyn SessionProvider,
    asset_id: &str,
    column: &str,
    inverse: &Inverse,
    output_column: &str,
    destination: &str,
) -> Result<JobReference> {
    let (from, to) = inverse.unzip();
    let expression = LookupExpression {
        output_column: output_column.to_string(),
        from,
        to,
        default_value: inverse.default_value(),
    };

    tracing::info!(asset = asset_id, column, pairs = expression.from.len(), destination, "submitting remote collection map");
    let mapped = session.map_remote_collection(asset_id, column, &expression)?;
    Ok(session.export(&mapped, destination, &ExportOptions::table(asset_stem(destination)))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoclass_cloud::InMemorySession;
    use geoclass_core::Matrix;

    #[test]
    fn test_visualization_properties_keys() {
        let table: ClassTable = "1,Forest,#00ff00\n2,Water,#0000ff".parse().unwrap();
        let props = visualization_properties(&table, "landcover").unwrap();
        assert_eq!(props["visualization_0_name"], "Classification");
        assert_eq!(props["visualization_0_values"], "0,1,2");
        assert_eq!(props["visualization_0_labels"], "no_data,Forest,Water");
        assert_eq!(props["visualization_0_bands"], "landcover");
    }

    #[test]
    fn test_offline_session_leaves_no_export() {
        let session = InMemorySession::new();
        session.add_image("users/me/lc", vec![("b1", vec![1, 2])], None);
        session.set_offline(true);

        let table: ClassTable = "1,A".parse().unwrap();
        let matrix = Matrix::from_buckets(vec![(1, vec![1i64])], 0);
        let err = reclassify_remote_image(&session, "users/me/lc", "b1", matrix.invert(), &table, "users/me/out")
            .unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable(_)));

        session.set_offline(false);
        assert!(session.exports().is_empty());
    }
}
