//! Engine configuration

use std::path::Path;

use geoclass_core::io::{Compression, WriteOptions};
use geoclass_core::{Error, Result};
use geoclass_parallel::ProcessingMode;
use serde::{Deserialize, Serialize};

/// Column added to vector outputs when none is configured.
pub const DEFAULT_OUTPUT_COLUMN: &str = "reclass";

/// Settings shared by every strategy of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Override the block height picked from the raster's storage layout
    pub block_rows: Option<usize>,
    pub processing: ProcessingMode,
    pub compression: Compression,
    /// Name of the attribute added to vector outputs
    pub output_column: String,
    /// Re-enumerate the source and validate the matrix against it before running
    pub strict: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_rows: None,
            processing: ProcessingMode::default(),
            compression: Compression::default(),
            output_column: DEFAULT_OUTPUT_COLUMN.to_string(),
            strict: false,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; missing fields keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text).map_err(|e| Error::InvalidParameter {
            name: "config",
            value: path.as_ref().display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_rows == Some(0) {
            return Err(Error::InvalidParameter {
                name: "block_rows",
                value: "0".to_string(),
                reason: "blocks need at least one row".to_string(),
            });
        }
        if self.output_column.trim().is_empty() {
            return Err(Error::InvalidParameter {
                name: "output_column",
                value: self.output_column.clone(),
                reason: "column name is empty".to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn write_options(&self, block_rows: usize) -> WriteOptions {
        WriteOptions {
            compression: self.compression,
            block_rows,
        }
    }
}
