//! The session capability the engine uses for every remote call.
//!
//! A [`SessionProvider`] is passed explicitly into each operation that needs
//! the remote service; there is no process-wide connection.

use std::collections::BTreeSet;
use std::fmt;

use geoclass_core::SourceValue;
use serde::{Deserialize, Serialize};

use crate::error::{CloudError, Result};

/// Catalog type of a remote asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    Image,
    Table,
    Folder,
    Other(String),
}

impl AssetKind {
    /// Parse the catalog's type string (`IMAGE`, `TABLE`, `FOLDER`, ...).
    pub fn from_type_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "IMAGE" => AssetKind::Image,
            "TABLE" => AssetKind::Table,
            "FOLDER" => AssetKind::Folder,
            _ => AssetKind::Other(name.to_string()),
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Image => f.write_str("IMAGE"),
            AssetKind::Table => f.write_str("TABLE"),
            AssetKind::Folder => f.write_str("FOLDER"),
            AssetKind::Other(name) => f.write_str(name),
        }
    }
}

/// A server-side computed dataset that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetHandle {
    pub id: String,
    /// Nominal pixel size of an image in meters, when the backend knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nominal_scale: Option<f64>,
}

impl AssetHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nominal_scale: None,
        }
    }
}

/// Handle to an asynchronous export, polled out-of-band.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobReference {
    pub id: String,
    /// Task description shown in the backend's task list
    pub description: String,
    /// Asset id the export writes to
    pub destination: String,
}

impl fmt::Display for JobReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} -> {})", self.id, self.description, self.destination)
    }
}

/// Lifecycle of an export job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed { reason: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed { .. })
    }

    /// Parse the backend's task state. Cancelled tasks count as failed.
    pub fn from_state(state: &str, error_message: Option<String>) -> Result<Self> {
        let status = match state.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "READY" | "UNSUBMITTED" => JobStatus::Pending,
            "RUNNING" | "CANCEL_REQUESTED" => JobStatus::Running,
            "COMPLETED" | "SUCCEEDED" => JobStatus::Completed,
            "FAILED" => JobStatus::Failed {
                reason: error_message.unwrap_or_else(|| "no reason given".to_string()),
            },
            "CANCELLED" => JobStatus::Failed {
                reason: error_message.unwrap_or_else(|| "cancelled".to_string()),
            },
            other => {
                return Err(CloudError::InvalidResponse(format!("unknown job state {other:?}")))
            }
        };
        Ok(status)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => f.write_str("PENDING"),
            JobStatus::Running => f.write_str("RUNNING"),
            JobStatus::Completed => f.write_str("COMPLETED"),
            JobStatus::Failed { reason } => write!(f, "FAILED: {reason}"),
        }
    }
}

/// Per-feature lookup evaluated server-side by a collection map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupExpression {
    /// Property written on every feature
    pub output_column: String,
    pub from: Vec<SourceValue>,
    pub to: Vec<i64>,
    /// Value for features whose key is missing from `from`
    pub default_value: i64,
}

/// Pyramiding policy applied to every band of an exported image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pyramiding {
    Mean,
    Mode,
    Sample,
}

/// Parameters of an export-to-asset task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pixels: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pyramiding: Option<Pyramiding>,
}

impl ExportOptions {
    /// Categorical image export: mode pyramids, no pixel cap in practice.
    pub fn categorical_image(description: impl Into<String>, scale: Option<f64>) -> Self {
        Self {
            description: description.into(),
            scale,
            max_pixels: Some(1e13),
            pyramiding: Some(Pyramiding::Mode),
        }
    }

    pub fn table(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            scale: None,
            max_pixels: None,
            pyramiding: None,
        }
    }
}

/// Remote compute capability consumed by the engine.
///
/// Every call is a blocking round trip; implementations enforce their own
/// timeouts and report them as [`CloudError::Timeout`].
pub trait SessionProvider: Send + Sync {
    /// Catalog type of an asset.
    fn asset_kind(&self, asset_id: &str) -> Result<AssetKind>;

    /// Band names of an image, or property names of a table's first feature.
    fn list_bands(&self, asset_id: &str) -> Result<Vec<String>>;

    /// Distinct values of an image band (frequency histogram over the full
    /// footprint) or a table column (aggregate of the column).
    fn enumerate_remote(&self, asset_id: &str, band_or_column: &str) -> Result<BTreeSet<SourceValue>>;

    /// Single-band image where `from[i]` becomes `to[i]` and anything else `default_value`.
    fn remap_remote_image(
        &self,
        asset_id: &str,
        band: &str,
        from: &[i64],
        to: &[i64],
        default_value: i64,
    ) -> Result<AssetHandle>;

    /// Attach image-level properties to a computed image.
    fn set_image_properties(
        &self,
        image: &AssetHandle,
        properties: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<AssetHandle>;

    /// Collection where each feature gains `expression.output_column`.
    fn map_remote_collection(
        &self,
        asset_id: &str,
        column: &str,
        expression: &LookupExpression,
    ) -> Result<AssetHandle>;

    /// Start persisting a computed dataset under `destination`.
    fn export(&self, asset: &AssetHandle, destination: &str, options: &ExportOptions) -> Result<JobReference>;

    fn job_status(&self, job: &JobReference) -> Result<JobStatus>;

    /// Ask the backend to stop a job. It may keep running for a while.
    fn cancel(&self, job: &JobReference) -> Result<()>;

    /// Asset ids directly under a folder.
    fn list_assets(&self, folder: &str) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_kind_parsing() {
        assert_eq!(AssetKind::from_type_name("IMAGE"), AssetKind::Image);
        assert_eq!(AssetKind::from_type_name("table"), AssetKind::Table);
        assert_eq!(
            AssetKind::from_type_name("IMAGE_COLLECTION"),
            AssetKind::Other("IMAGE_COLLECTION".into())
        );
    }

    #[test]
    fn test_job_state_parsing() {
        assert_eq!(JobStatus::from_state("READY", None).unwrap(), JobStatus::Pending);
        assert_eq!(JobStatus::from_state("RUNNING", None).unwrap(), JobStatus::Running);
        assert_eq!(JobStatus::from_state("COMPLETED", None).unwrap(), JobStatus::Completed);
        assert_eq!(
            JobStatus::from_state("FAILED", Some("quota".into())).unwrap(),
            JobStatus::Failed { reason: "quota".into() }
        );
        assert!(JobStatus::from_state("EXPLODED", None).is_err());
    }

    #[test]
    fn test_categorical_export_options() {
        let opts = ExportOptions::categorical_image("lc_reclass", Some(30.0));
        let json = serde_json::to_value(&opts).unwrap();
        assert_eq!(json["max_pixels"], 1e13);
        assert_eq!(json["pyramiding"], "mode");
        assert_eq!(json["description"], "lc_reclass");
    }
}
