//! Class table → palette conversions

use std::collections::BTreeMap;

use geoclass_core::raster::ColorTable;
use geoclass_core::{ClassTable, Error, Result, Rgb};
use serde::{Deserialize, Serialize};

/// Label of the implicit class 0 in remote visualization metadata.
pub const NO_DATA_LABEL: &str = "no_data";

/// Largest class code an 8-bit output band can carry.
const MAX_CODE: i64 = u8::MAX as i64;

/// Code → (label, color) lookup for categorical outputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoricalPalette {
    classes: BTreeMap<i64, (String, Rgb)>,
}

impl CategoricalPalette {
    pub fn from_class_table(table: &ClassTable) -> Self {
        Self {
            classes: table
                .iter()
                .map(|e| (e.code, (e.name.clone(), e.color)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Opaque RGBA color of a class, if the table defines it.
    pub fn rgba(&self, code: i64) -> Option<[u8; 4]> {
        self.classes
            .get(&code)
            .map(|(_, Rgb { r, g, b })| [*r, *g, *b, 255])
    }

    /// Color table for an 8-bit band. Codes outside `0..=255` cannot be indexed.
    pub fn color_table(&self) -> Result<ColorTable> {
        self.classes
            .iter()
            .map(|(&code, (_, Rgb { r, g, b }))| {
                u8::try_from(code)
                    .map(|index| (index, [*r, *g, *b, 255]))
                    .map_err(|_| Error::ClassCodeRange {
                        code,
                        max: MAX_CODE,
                    })
            })
            .collect()
    }

    /// Image properties the remote catalog uses to style a categorical band.
    ///
    /// Class 0 is listed first as no-data unless the table already defines it.
    pub fn visualization(&self, band: &str) -> VisualizationProperties {
        let mut values = Vec::with_capacity(self.classes.len() + 1);
        let mut labels = Vec::with_capacity(self.classes.len() + 1);
        let mut palette = Vec::with_capacity(self.classes.len() + 1);

        if !self.classes.contains_key(&0) {
            values.push("0".to_string());
            labels.push(NO_DATA_LABEL.to_string());
            palette.push(Rgb::BLACK.to_hex());
        }
        for (code, (name, color)) in &self.classes {
            values.push(code.to_string());
            labels.push(name.clone());
            palette.push(color.to_hex());
        }

        VisualizationProperties {
            name: "Classification".to_string(),
            bands: band.to_string(),
            kind: "categorical".to_string(),
            labels: labels.join(","),
            palette: palette.join(","),
            values: values.join(","),
        }
    }
}

/// `visualization_0_*` image properties, serialized under their catalog keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualizationProperties {
    #[serde(rename = "visualization_0_name")]
    pub name: String,
    #[serde(rename = "visualization_0_bands")]
    pub bands: String,
    #[serde(rename = "visualization_0_type")]
    pub kind: String,
    #[serde(rename = "visualization_0_labels")]
    pub labels: String,
    #[serde(rename = "visualization_0_palette")]
    pub palette: String,
    #[serde(rename = "visualization_0_values")]
    pub values: String,
}
