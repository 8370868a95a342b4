//! JSON request and response bodies of the compute service REST API.
//!
//! Server-side computations are described as [`Expression`]s. An expression is
//! either evaluated immediately (`value:compute`) or registered
//! (`expressions`) so it can be handed to an export task by name.

use std::collections::BTreeSet;

use geoclass_core::SourceValue;
use serde::{Deserialize, Serialize};

use crate::error::{CloudError, Result};
use crate::session::{ExportOptions, JobReference, JobStatus, Pyramiding};

/// Server-side computation graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Expression {
    /// Frequency histogram of a band over the image footprint
    #[serde(rename_all = "camelCase")]
    FrequencyHistogram {
        asset: String,
        band: String,
        max_pixels: f64,
    },
    /// Distinct values of a table column
    #[serde(rename_all = "camelCase")]
    AggregateDistinct { asset: String, column: String },
    /// Per-pixel lookup producing a single-band image
    #[serde(rename_all = "camelCase")]
    Remap {
        asset: String,
        band: String,
        from: Vec<i64>,
        to: Vec<i64>,
        default_value: i64,
    },
    /// Attach image-level properties to a registered expression
    #[serde(rename_all = "camelCase")]
    SetProperties {
        input: String,
        properties: serde_json::Map<String, serde_json::Value>,
    },
    /// Per-feature lookup adding `output_column` to every feature
    #[serde(rename_all = "camelCase")]
    MapLookup {
        asset: String,
        column: String,
        output_column: String,
        from: Vec<SourceValue>,
        to: Vec<i64>,
        default_value: i64,
    },
}

#[derive(Debug, Serialize)]
pub struct ComputeRequest<'a> {
    pub expression: &'a Expression,
}

#[derive(Debug, Deserialize)]
pub struct ComputeResponse {
    #[serde(default)]
    pub result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionResponse {
    pub name: String,
    #[serde(default)]
    pub nominal_scale: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct BandInfo {
    pub id: String,
}

/// Catalog metadata of one asset.
#[derive(Debug, Deserialize)]
pub struct AssetInfo {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub bands: Vec<BandInfo>,
    /// Property names of the first feature, for tables
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssetSummary {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListAssetsResponse {
    #[serde(default)]
    pub assets: Vec<AssetSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest<'a> {
    pub expression: &'a str,
    pub asset_id: &'a str,
    pub description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pixels: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pyramiding_policy: Option<serde_json::Value>,
}

impl<'a> ExportRequest<'a> {
    pub fn new(expression: &'a str, asset_id: &'a str, options: &'a ExportOptions) -> Self {
        Self {
            expression,
            asset_id,
            description: &options.description,
            scale: options.scale,
            max_pixels: options.max_pixels,
            pyramiding_policy: options
                .pyramiding
                .map(|p| serde_json::json!({ ".default": pyramiding_name(p) })),
        }
    }
}

fn pyramiding_name(policy: Pyramiding) -> &'static str {
    match policy {
        Pyramiding::Mean => "MEAN",
        Pyramiding::Mode => "MODE",
        Pyramiding::Sample => "SAMPLE",
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OperationMetadata {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub destination: String,
}

#[derive(Debug, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub message: String,
}

/// A long-running export task.
#[derive(Debug, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub metadata: OperationMetadata,
    #[serde(default)]
    pub error: Option<OperationError>,
}

impl Operation {
    pub fn job_reference(&self) -> JobReference {
        JobReference {
            id: self.name.clone(),
            description: self.metadata.description.clone(),
            destination: self.metadata.destination.clone(),
        }
    }

    pub fn status(&self) -> Result<JobStatus> {
        JobStatus::from_state(
            &self.metadata.state,
            self.error.as_ref().map(|e| e.message.clone()),
        )
    }
}

/// Keys of a frequency histogram (`{"1": 120, "4": 7}`) as source values.
///
/// Keys arrive as strings; integral ones, including `"3.0"`, become integers.
pub fn histogram_keys(result: &serde_json::Value) -> Result<BTreeSet<SourceValue>> {
    let object = match result {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => return Ok(BTreeSet::new()),
        other => {
            return Err(CloudError::InvalidResponse(format!(
                "expected a histogram object, got {other}"
            )))
        }
    };
    Ok(object
        .iter()
        .filter(|(_, count)| count.as_f64().map_or(true, |c| c > 0.0))
        .map(|(key, _)| parse_key(key))
        .collect())
}

fn parse_key(key: &str) -> SourceValue {
    let key = key.trim();
    if let Ok(v) = key.parse::<i64>() {
        return SourceValue::Int(v);
    }
    match key.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => SourceValue::Int(v as i64),
        _ => SourceValue::Text(key.to_string()),
    }
}

/// Convert a JSON property value into a lookup key. Nulls have none.
pub fn json_to_source_value(value: &serde_json::Value) -> Option<SourceValue> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(v), _) => Some(SourceValue::Int(v)),
            (None, Some(v)) if v.fract() == 0.0 && v.abs() < 9.0e15 => Some(SourceValue::Int(v as i64)),
            _ => Some(SourceValue::Text(n.to_string())),
        },
        serde_json::Value::String(s) => Some(SourceValue::Text(s.clone())),
        other => Some(SourceValue::Text(other.to_string())),
    }
}

/// Distinct column values (`[1, "A", null]`) as source values.
pub fn distinct_values(result: &serde_json::Value) -> Result<BTreeSet<SourceValue>> {
    match result {
        serde_json::Value::Array(items) => Ok(items.iter().filter_map(json_to_source_value).collect()),
        serde_json::Value::Null => Ok(BTreeSet::new()),
        other => Err(CloudError::InvalidResponse(format!(
            "expected a list of distinct values, got {other}"
        ))),
    }
}
