//! In-process [`SessionProvider`] holding images and tables in memory.
//!
//! Computations really run: remaps produce new band data, collection maps
//! produce new rows, and a completed export stores the result under its
//! destination id. Jobs advance one state per `job_status` poll
//! (`Pending → Running → Completed`).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use geoclass_core::SourceValue;
use serde_json::{Map, Value};

use crate::error::{CloudError, Result};
use crate::payload::json_to_source_value;
use crate::session::{
    AssetHandle, AssetKind, ExportOptions, JobReference, JobStatus, LookupExpression, SessionProvider,
};

type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
struct MemoryImage {
    bands: Vec<(String, Vec<i64>)>,
    nominal_scale: Option<f64>,
    properties: Row,
}

#[derive(Debug, Clone, PartialEq)]
enum Dataset {
    Image(MemoryImage),
    Table(Vec<Row>),
}

#[derive(Debug)]
struct MemoryJob {
    reference: JobReference,
    computed: String,
    status: JobStatus,
    fail_with: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    assets: BTreeMap<String, Dataset>,
    computed: BTreeMap<String, Dataset>,
    jobs: BTreeMap<String, MemoryJob>,
    exports: Vec<(String, ExportOptions)>,
    next_id: u64,
    offline: bool,
    fail_next_export: Option<String>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}/{}", self.next_id)
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline {
            Err(CloudError::Network("session is offline".into()))
        } else {
            Ok(())
        }
    }

    fn dataset(&self, id: &str) -> Result<&Dataset> {
        self.assets
            .get(id)
            .or_else(|| self.computed.get(id))
            .ok_or_else(|| CloudError::NotFound(id.to_string()))
    }

    fn image(&self, id: &str) -> Result<&MemoryImage> {
        match self.dataset(id)? {
            Dataset::Image(img) => Ok(img),
            Dataset::Table(_) => Err(CloudError::InvalidResponse(format!("{id} is a table, not an image"))),
        }
    }

    fn table(&self, id: &str) -> Result<&Vec<Row>> {
        match self.dataset(id)? {
            Dataset::Table(rows) => Ok(rows),
            Dataset::Image(_) => Err(CloudError::InvalidResponse(format!("{id} is an image, not a table"))),
        }
    }
}

/// Session whose "backend" lives in this process.
#[derive(Debug, Default)]
pub struct InMemorySession {
    state: Mutex<State>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an image asset with named bands of equal length.
    pub fn add_image(&self, asset_id: &str, bands: Vec<(&str, Vec<i64>)>, nominal_scale: Option<f64>) {
        let image = MemoryImage {
            bands: bands.into_iter().map(|(name, data)| (name.to_string(), data)).collect(),
            nominal_scale,
            properties: Row::new(),
        };
        self.lock().assets.insert(asset_id.to_string(), Dataset::Image(image));
    }

    /// Register a table asset; each row is one feature's properties.
    pub fn add_table(&self, asset_id: &str, rows: Vec<Row>) {
        self.lock().assets.insert(asset_id.to_string(), Dataset::Table(rows));
    }

    /// Make every subsequent call fail as if the service were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// The next submitted export fails asynchronously with `reason`.
    pub fn fail_next_export(&self, reason: impl Into<String>) {
        self.lock().fail_next_export = Some(reason.into());
    }

    /// Band data of a stored asset (including completed exports).
    pub fn image_band(&self, asset_id: &str, band: &str) -> Option<Vec<i64>> {
        match self.lock().assets.get(asset_id)? {
            Dataset::Image(img) => img.bands.iter().find(|(n, _)| n == band).map(|(_, d)| d.clone()),
            Dataset::Table(_) => None,
        }
    }

    /// Image-level properties of a stored asset.
    pub fn image_properties(&self, asset_id: &str) -> Option<Row> {
        match self.lock().assets.get(asset_id)? {
            Dataset::Image(img) => Some(img.properties.clone()),
            Dataset::Table(_) => None,
        }
    }

    pub fn table_rows(&self, asset_id: &str) -> Option<Vec<Row>> {
        match self.lock().assets.get(asset_id)? {
            Dataset::Table(rows) => Some(rows.clone()),
            Dataset::Image(_) => None,
        }
    }

    /// Every export submitted so far, as `(destination, options)`.
    pub fn exports(&self) -> Vec<(String, ExportOptions)> {
        self.lock().exports.clone()
    }

    pub fn contains(&self, asset_id: &str) -> bool {
        self.lock().assets.contains_key(asset_id)
    }
}

impl SessionProvider for InMemorySession {
    fn asset_kind(&self, asset_id: &str) -> Result<AssetKind> {
        let state = self.lock();
        state.ensure_online()?;
        match state.assets.get(asset_id) {
            Some(Dataset::Image(_)) => Ok(AssetKind::Image),
            Some(Dataset::Table(_)) => Ok(AssetKind::Table),
            None if state.assets.keys().any(|k| k.starts_with(&format!("{asset_id}/"))) => {
                Ok(AssetKind::Folder)
            }
            None => Err(CloudError::NotFound(asset_id.to_string())),
        }
    }

    fn list_bands(&self, asset_id: &str) -> Result<Vec<String>> {
        let state = self.lock();
        state.ensure_online()?;
        match state.dataset(asset_id)? {
            Dataset::Image(img) => Ok(img.bands.iter().map(|(n, _)| n.clone()).collect()),
            Dataset::Table(rows) => Ok(rows.first().map(|r| r.keys().cloned().collect()).unwrap_or_default()),
        }
    }

    fn enumerate_remote(&self, asset_id: &str, band_or_column: &str) -> Result<BTreeSet<SourceValue>> {
        let state = self.lock();
        state.ensure_online()?;
        match state.dataset(asset_id)? {
            Dataset::Image(img) => {
                let (_, data) = img
                    .bands
                    .iter()
                    .find(|(n, _)| n == band_or_column)
                    .ok_or_else(|| CloudError::NotFound(format!("{asset_id} band {band_or_column}")))?;
                Ok(data.iter().map(|&v| SourceValue::Int(v)).collect())
            }
            Dataset::Table(rows) => Ok(rows
                .iter()
                .filter_map(|r| r.get(band_or_column))
                .filter_map(json_to_source_value)
                .collect()),
        }
    }

    fn remap_remote_image(
        &self,
        asset_id: &str,
        band: &str,
        from: &[i64],
        to: &[i64],
        default_value: i64,
    ) -> Result<AssetHandle> {
        if from.len() != to.len() {
            return Err(CloudError::Status {
                status: 400,
                message: format!("remap lists differ in length ({} vs {})", from.len(), to.len()),
            });
        }
        let mut state = self.lock();
        state.ensure_online()?;
        let image = state.image(asset_id)?;
        let (_, data) = image
            .bands
            .iter()
            .find(|(n, _)| n == band)
            .ok_or_else(|| CloudError::NotFound(format!("{asset_id} band {band}")))?;

        let lookup: BTreeMap<i64, i64> = from.iter().copied().zip(to.iter().copied()).collect();
        let remapped = data
            .iter()
            .map(|v| lookup.get(v).copied().unwrap_or(default_value))
            .collect();
        let result = MemoryImage {
            bands: vec![("remapped".to_string(), remapped)],
            nominal_scale: image.nominal_scale,
            properties: Row::new(),
        };
        let nominal_scale = result.nominal_scale;

        let id = state.next_id("expressions");
        state.computed.insert(id.clone(), Dataset::Image(result));
        Ok(AssetHandle { id, nominal_scale })
    }

    fn set_image_properties(&self, image: &AssetHandle, properties: &Row) -> Result<AssetHandle> {
        let mut state = self.lock();
        state.ensure_online()?;
        let mut result = state.image(&image.id)?.clone();
        result
            .properties
            .extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
        let nominal_scale = result.nominal_scale;

        let id = state.next_id("expressions");
        state.computed.insert(id.clone(), Dataset::Image(result));
        Ok(AssetHandle { id, nominal_scale })
    }

    fn map_remote_collection(
        &self,
        asset_id: &str,
        column: &str,
        expression: &LookupExpression,
    ) -> Result<AssetHandle> {
        let mut state = self.lock();
        state.ensure_online()?;
        let lookup: BTreeMap<&SourceValue, i64> =
            expression.from.iter().zip(expression.to.iter().copied()).collect();

        let rows = state
            .table(asset_id)?
            .iter()
            .map(|row| {
                let code = row
                    .get(column)
                    .and_then(json_to_source_value)
                    .and_then(|key| lookup.get(&key).copied())
                    .unwrap_or(expression.default_value);
                let mut row = row.clone();
                row.insert(expression.output_column.clone(), Value::from(code));
                row
            })
            .collect();

        let id = state.next_id("expressions");
        state.computed.insert(id.clone(), Dataset::Table(rows));
        Ok(AssetHandle::new(id))
    }

    fn export(&self, asset: &AssetHandle, destination: &str, options: &ExportOptions) -> Result<JobReference> {
        let mut state = self.lock();
        state.ensure_online()?;
        if state.assets.contains_key(destination) {
            return Err(CloudError::Status {
                status: 400,
                message: format!("cannot overwrite asset '{destination}'"),
            });
        }
        state.dataset(&asset.id)?;

        let reference = JobReference {
            id: state.next_id("operations"),
            description: options.description.clone(),
            destination: destination.to_string(),
        };
        let fail_with = state.fail_next_export.take();
        state.jobs.insert(
            reference.id.clone(),
            MemoryJob {
                reference: reference.clone(),
                computed: asset.id.clone(),
                status: JobStatus::Pending,
                fail_with,
            },
        );
        state.exports.push((destination.to_string(), options.clone()));
        Ok(reference)
    }

    fn job_status(&self, job: &JobReference) -> Result<JobStatus> {
        let mut state = self.lock();
        state.ensure_online()?;
        let entry = state
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| CloudError::NotFound(job.id.clone()))?;

        let next = match (&entry.status, &entry.fail_with) {
            (JobStatus::Pending, _) => JobStatus::Running,
            (JobStatus::Running, Some(reason)) => JobStatus::Failed { reason: reason.clone() },
            (JobStatus::Running, None) => JobStatus::Completed,
            (terminal, _) => return Ok(terminal.clone()),
        };
        entry.status = next.clone();

        if next == JobStatus::Completed {
            let computed = entry.computed.clone();
            let destination = entry.reference.destination.clone();
            let dataset = state.dataset(&computed)?.clone();
            state.assets.insert(destination, dataset);
        }
        Ok(next)
    }

    fn cancel(&self, job: &JobReference) -> Result<()> {
        let mut state = self.lock();
        state.ensure_online()?;
        let entry = state
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| CloudError::NotFound(job.id.clone()))?;
        if !entry.status.is_terminal() {
            entry.status = JobStatus::Failed {
                reason: "cancelled".to_string(),
            };
        }
        Ok(())
    }

    fn list_assets(&self, folder: &str) -> Result<Vec<String>> {
        let state = self.lock();
        state.ensure_online()?;
        let prefix = format!("{}/", folder.trim_end_matches('/'));
        Ok(state
            .assets
            .keys()
            .filter(|id| id.strip_prefix(&prefix).is_some_and(|rest| !rest.contains('/')))
            .cloned()
            .collect())
    }
}
