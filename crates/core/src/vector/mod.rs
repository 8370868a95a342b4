//! Vector features and their attribute tables

use std::collections::HashMap;

use geo_types::Geometry;
use serde::{Deserialize, Serialize};

use crate::matrix::SourceValue;

/// One cell of a feature's attribute table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Nested arrays or objects, kept as-is
    Json(serde_json::Value),
}

impl AttributeValue {
    /// The lookup key this attribute contributes to a reclassification.
    ///
    /// Integers and integral floats are numeric keys; strings, booleans and
    /// fractional floats are text keys; nulls have no key and always take
    /// the matrix default.
    pub fn to_source_value(&self) -> Option<SourceValue> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Int(v) => Some(SourceValue::Int(*v)),
            AttributeValue::Float(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => {
                Some(SourceValue::Int(*v as i64))
            }
            AttributeValue::Float(v) => Some(SourceValue::Text(v.to_string())),
            AttributeValue::Bool(v) => Some(SourceValue::Text(v.to_string())),
            AttributeValue::String(s) => Some(SourceValue::Text(s.clone())),
            AttributeValue::Json(v) => Some(SourceValue::Text(v.to_string())),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

/// A feature: optional geometry, attribute row and id
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Carried to the output unchanged
    pub geometry: Option<Geometry<f64>>,
    pub properties: HashMap<String, AttributeValue>,
    pub id: Option<AttributeValue>,
    /// GeoJSON geometry exactly as read, Z/M ordinates included
    pub geojson_geometry: Option<geojson::Geometry>,
    /// Feature-level `bbox`
    pub bbox: Option<Vec<f64>>,
    /// Feature-level members other than the standard ones
    pub foreign_members: serde_json::Map<String, serde_json::Value>,
}

impl Feature {
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            ..Self::empty()
        }
    }

    /// Feature without geometry (attribute-only tables)
    pub fn empty() -> Self {
        Self {
            geometry: None,
            properties: HashMap::new(),
            id: None,
            geojson_geometry: None,
            bbox: None,
            foreign_members: serde_json::Map::new(),
        }
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// Collection of features sharing one attribute schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    /// Attribute columns in table order
    pub columns: Vec<String>,
    /// Collection-level members other than `features` (e.g. `name`, `crs`)
    pub foreign_members: serde_json::Map<String, serde_json::Value>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a feature, registering any attribute column not seen before.
    pub fn push(&mut self, feature: Feature) {
        let mut fresh: Vec<&String> = feature
            .properties
            .keys()
            .filter(|k| !self.columns.contains(k))
            .collect();
        fresh.sort();
        let fresh: Vec<String> = fresh.into_iter().cloned().collect();
        self.columns.extend(fresh);
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Add a column to the schema; features without it read as null.
    pub fn add_column(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.has_column(&name) {
            self.columns.push(name);
        }
    }

    /// A column name not yet in the schema, starting from `preferred`.
    pub fn unused_column_name(&self, preferred: &str) -> String {
        if !self.has_column(preferred) {
            return preferred.to_string();
        }
        (1..)
            .map(|n| format!("{preferred}_{n}"))
            .find(|candidate| !self.has_column(candidate))
            .unwrap_or_else(|| preferred.to_string())
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_keys() {
        assert_eq!(AttributeValue::Int(3).to_source_value(), Some(SourceValue::Int(3)));
        assert_eq!(AttributeValue::Float(4.0).to_source_value(), Some(SourceValue::Int(4)));
        assert_eq!(
            AttributeValue::Float(4.5).to_source_value(),
            Some(SourceValue::Text("4.5".into()))
        );
        assert_eq!(
            AttributeValue::Bool(true).to_source_value(),
            Some(SourceValue::Text("true".into()))
        );
        assert_eq!(AttributeValue::Null.to_source_value(), None);
    }

    #[test]
    fn test_columns_follow_insertion() {
        let mut fc = FeatureCollection::new();
        let mut f = Feature::empty();
        f.set_property("b", AttributeValue::Int(1));
        f.set_property("a", AttributeValue::Int(2));
        fc.push(f);
        let mut g = Feature::empty();
        g.set_property("c", AttributeValue::Null);
        fc.push(g);
        assert_eq!(fc.columns, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unused_column_name() {
        let mut fc = FeatureCollection::new();
        assert_eq!(fc.unused_column_name("reclass"), "reclass");
        fc.add_column("reclass");
        fc.add_column("reclass_1");
        assert_eq!(fc.unused_column_name("reclass"), "reclass_2");
    }
}
