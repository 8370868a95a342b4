//! Source descriptors

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File suffixes read as rasters.
pub const RASTER_SUFFIXES: &[&str] = &["tif", "tiff", "vrt"];
/// File suffixes read as vector tables.
pub const VECTOR_SUFFIXES: &[&str] = &["shp", "geojson"];

/// The four backends a reclassification can run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    LocalRaster,
    LocalVector,
    RemoteImage,
    RemoteFeatureCollection,
}

impl SourceKind {
    pub fn is_remote(&self) -> bool {
        matches!(self, SourceKind::RemoteImage | SourceKind::RemoteFeatureCollection)
    }

    pub fn is_raster(&self) -> bool {
        matches!(self, SourceKind::LocalRaster | SourceKind::RemoteImage)
    }

    /// Classify a local path by its suffix (case-insensitive).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if RASTER_SUFFIXES.contains(&ext.as_str()) {
            Ok(SourceKind::LocalRaster)
        } else if VECTOR_SUFFIXES.contains(&ext.as_str()) {
            Ok(SourceKind::LocalVector)
        } else {
            Err(Error::UnrecognizedSource {
                location: path.display().to_string(),
                reason: if ext.is_empty() {
                    "file has no suffix".to_string()
                } else {
                    format!("unsupported file format .{}", ext)
                },
            })
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::LocalRaster => "local raster",
            SourceKind::LocalVector => "local vector",
            SourceKind::RemoteImage => "remote image",
            SourceKind::RemoteFeatureCollection => "remote feature collection",
        };
        f.write_str(name)
    }
}

/// A raster band (1-based) or a named band / attribute column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BandOrColumn {
    Band(usize),
    Name(String),
}

impl BandOrColumn {
    /// Numbers become band indices, anything else a name.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<usize>() {
            Ok(n) => BandOrColumn::Band(n),
            Err(_) => BandOrColumn::Name(raw.trim().to_string()),
        }
    }

    /// The 1-based band index for a local raster.
    pub fn band_index(&self) -> Result<usize> {
        match self {
            BandOrColumn::Band(0) => Err(Error::InvalidParameter {
                name: "band",
                value: "0".to_string(),
                reason: "bands are numbered from 1".to_string(),
            }),
            BandOrColumn::Band(n) => Ok(*n),
            BandOrColumn::Name(name) => Err(Error::InvalidParameter {
                name: "band",
                value: name.clone(),
                reason: "local rasters address bands by number".to_string(),
            }),
        }
    }

    /// The band or column name as the remote backend and vector tables see it.
    pub fn name(&self) -> String {
        match self {
            BandOrColumn::Band(n) => n.to_string(),
            BandOrColumn::Name(name) => name.clone(),
        }
    }
}

impl fmt::Display for BandOrColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<usize> for BandOrColumn {
    fn from(n: usize) -> Self {
        BandOrColumn::Band(n)
    }
}

impl From<&str> for BandOrColumn {
    fn from(s: &str) -> Self {
        BandOrColumn::Name(s.to_string())
    }
}

/// What to reclassify: a kind, a location and the band or column to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    pub location: String,
    pub band_or_column: BandOrColumn,
}

impl SourceDescriptor {
    pub fn new(kind: SourceKind, location: impl Into<String>, band_or_column: impl Into<BandOrColumn>) -> Self {
        Self {
            kind,
            location: location.into(),
            band_or_column: band_or_column.into(),
        }
    }

    /// Describe a local file, classifying it by suffix.
    pub fn local(path: impl Into<String>, band_or_column: impl Into<BandOrColumn>) -> Result<Self> {
        let location = path.into();
        let kind = SourceKind::from_path(&location)?;
        Ok(Self::new(kind, location, band_or_column))
    }
}
