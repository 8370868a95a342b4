//! Reclassification matrix
//!
//! A [`Matrix`] maps each destination class code to the set of source values
//! folded into it. The value-keyed [`Inverse`] is what strategies actually use
//! to remap data; it is derived lazily and dropped on every mutation.
//!
//! Interactive authoring goes through [`MatrixBuilder`], where re-assigning a
//! value moves it to its new bucket. The frozen [`Matrix`] itself never
//! overwrites: a value placed in two buckets is reported by
//! [`Matrix::validate`] as a [`Error::DuplicateAssignment`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A value found in a source band or attribute column.
///
/// Integers order before text, so an enumeration of a mixed column is stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceValue {
    Int(i64),
    Text(String),
}

impl SourceValue {
    /// Parse a raw token, preferring an integer reading.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(v) => SourceValue::Int(v),
            Err(_) => SourceValue::Text(trimmed.to_string()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SourceValue::Int(v) => Some(*v),
            SourceValue::Text(_) => None,
        }
    }
}

impl fmt::Display for SourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceValue::Int(v) => write!(f, "{}", v),
            SourceValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for SourceValue {
    fn from(v: i64) -> Self {
        SourceValue::Int(v)
    }
}

impl From<i32> for SourceValue {
    fn from(v: i32) -> Self {
        SourceValue::Int(v as i64)
    }
}

impl From<&str> for SourceValue {
    fn from(v: &str) -> Self {
        SourceValue::Text(v.to_string())
    }
}

impl From<String> for SourceValue {
    fn from(v: String) -> Self {
        SourceValue::Text(v)
    }
}

/// Source value → destination code lookup derived from a [`Matrix`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inverse {
    map: BTreeMap<SourceValue, i64>,
    default_value: i64,
}

impl Inverse {
    /// Destination code for `value`, or the default when it is unmapped.
    pub fn get(&self, value: &SourceValue) -> i64 {
        self.map.get(value).copied().unwrap_or(self.default_value)
    }

    /// Destination code for `value` if the matrix maps it.
    pub fn lookup(&self, value: &SourceValue) -> Option<i64> {
        self.map.get(value).copied()
    }

    pub fn contains(&self, value: &SourceValue) -> bool {
        self.map.contains_key(value)
    }

    pub fn default_value(&self) -> i64 {
        self.default_value
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Pairs in source value order.
    pub fn iter(&self) -> impl Iterator<Item = (&SourceValue, i64)> {
        self.map.iter().map(|(k, v)| (k, *v))
    }

    /// Distinct destination codes reachable through the mapping.
    pub fn destination_codes(&self) -> BTreeSet<i64> {
        self.map.values().copied().collect()
    }

    /// Split into parallel `from` / `to` lists, as remote remap calls expect.
    pub fn unzip(&self) -> (Vec<SourceValue>, Vec<i64>) {
        self.map.iter().map(|(k, v)| (k.clone(), *v)).unzip()
    }
}

/// Destination code → set of source values.
#[derive(Debug, Default)]
pub struct Matrix {
    buckets: BTreeMap<i64, BTreeSet<SourceValue>>,
    default_value: i64,
    inverse: OnceLock<Inverse>,
}

impl Clone for Matrix {
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets.clone(),
            default_value: self.default_value,
            inverse: OnceLock::new(),
        }
    }
}

impl PartialEq for Matrix {
    fn eq(&self, other: &Self) -> bool {
        self.buckets == other.buckets && self.default_value == other.default_value
    }
}

impl Matrix {
    /// Empty matrix with the conventional `0` fallback.
    pub fn new() -> Self {
        Self::with_default(0)
    }

    pub fn with_default(default_value: i64) -> Self {
        Self {
            buckets: BTreeMap::new(),
            default_value,
            inverse: OnceLock::new(),
        }
    }

    /// Build from `(destination, [sources])` rows.
    pub fn from_buckets<I, V>(rows: I, default_value: i64) -> Self
    where
        I: IntoIterator<Item = (i64, Vec<V>)>,
        V: Into<SourceValue>,
    {
        let mut matrix = Self::with_default(default_value);
        for (code, values) in rows {
            let bucket = matrix.buckets.entry(code).or_default();
            bucket.extend(values.into_iter().map(Into::into));
        }
        matrix
    }

    /// Identity mapping: every value becomes its own class.
    pub fn identity(values: &[SourceValue], default_value: i64) -> Self {
        let mut matrix = Self::with_default(default_value);
        for v in values {
            if let SourceValue::Int(code) = v {
                matrix.buckets.entry(*code).or_default().insert(v.clone());
            }
        }
        matrix
    }

    /// Fold `value` into the bucket of `destination_code`.
    ///
    /// The value is not removed from other buckets; a second assignment is
    /// left for [`Matrix::validate`] to reject.
    pub fn add(&mut self, destination_code: i64, value: impl Into<SourceValue>) {
        self.buckets
            .entry(destination_code)
            .or_default()
            .insert(value.into());
        self.inverse = OnceLock::new();
    }

    /// Remove `value` from every bucket. Returns whether anything was removed.
    pub fn remove(&mut self, value: &SourceValue) -> bool {
        let mut removed = false;
        for bucket in self.buckets.values_mut() {
            removed |= bucket.remove(value);
        }
        self.buckets.retain(|_, b| !b.is_empty());
        self.inverse = OnceLock::new();
        removed
    }

    pub fn set_default_value(&mut self, default_value: i64) {
        self.default_value = default_value;
        self.inverse = OnceLock::new();
    }

    pub fn default_value(&self) -> i64 {
        self.default_value
    }

    pub fn buckets(&self) -> &BTreeMap<i64, BTreeSet<SourceValue>> {
        &self.buckets
    }

    pub fn bucket(&self, destination_code: i64) -> Option<&BTreeSet<SourceValue>> {
        self.buckets.get(&destination_code)
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(|b| b.is_empty())
    }

    /// Number of source values across all buckets.
    pub fn value_count(&self) -> usize {
        self.buckets.values().map(|b| b.len()).sum()
    }

    /// Destination codes, including the default value.
    pub fn output_codes(&self) -> BTreeSet<i64> {
        let mut codes: BTreeSet<i64> = self.buckets.keys().copied().collect();
        codes.insert(self.default_value);
        codes
    }

    /// Reject source values that sit in more than one bucket.
    pub fn check_assignments(&self) -> Result<()> {
        let mut seen: BTreeMap<&SourceValue, i64> = BTreeMap::new();
        for (code, bucket) in &self.buckets {
            for value in bucket {
                if let Some(first) = seen.insert(value, *code) {
                    return Err(Error::DuplicateAssignment {
                        value: value.clone(),
                        first,
                        second: *code,
                    });
                }
            }
        }
        Ok(())
    }

    /// Check the matrix against the values enumerated from the active source.
    pub fn validate(&self, against: &BTreeSet<SourceValue>) -> Result<()> {
        for bucket in self.buckets.values() {
            if let Some(unknown) = bucket.iter().find(|v| !against.contains(v)) {
                return Err(Error::UnknownSourceValue(unknown.clone()));
            }
        }
        self.check_assignments()
    }

    /// Value-keyed lookup, computed on first use after a mutation.
    ///
    /// When a value sits in several buckets the highest destination code wins;
    /// run [`Matrix::validate`] first to rule that out.
    pub fn invert(&self) -> &Inverse {
        self.inverse.get_or_init(|| {
            let mut map = BTreeMap::new();
            for (code, bucket) in &self.buckets {
                for value in bucket {
                    map.insert(value.clone(), *code);
                }
            }
            Inverse {
                map,
                default_value: self.default_value,
            }
        })
    }

    // Persistence

    /// Load the `destination,source,source,...` text format.
    pub fn load<P: AsRef<Path>>(path: P, default_value: i64) -> Result<Self> {
        let file = fs::File::open(path.as_ref())?;
        Self::from_reader(file, default_value)
    }

    pub fn from_reader<R: Read>(reader: R, default_value: i64) -> Result<Self> {
        let mut matrix = Self::with_default(default_value);
        for (lineno, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split(',');
            let code_field = fields.next().unwrap_or_default().trim();
            let code: i64 = code_field.parse().map_err(|_| {
                Error::InvalidMatrix(format!(
                    "line {}: destination code {:?} is not an integer",
                    lineno + 1,
                    code_field
                ))
            })?;
            let bucket = matrix.buckets.entry(code).or_default();
            for raw in fields {
                if raw.trim().is_empty() {
                    continue;
                }
                bucket.insert(SourceValue::parse(raw));
            }
        }
        Ok(matrix)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = fs::File::create(path.as_ref())?;
        self.to_writer(&mut file)?;
        file.flush()?;
        Ok(())
    }

    pub fn to_writer<W: Write>(&self, writer: &mut W) -> Result<()> {
        for (code, bucket) in &self.buckets {
            write!(writer, "{}", code)?;
            for value in bucket {
                let text = value.to_string();
                if text.is_empty() {
                    return Err(Error::InvalidMatrix(format!(
                        "empty text value under code {} would reload as no value",
                        code
                    )));
                }
                if text.contains([',', '\n', '\r']) || text.trim() != text {
                    return Err(Error::InvalidMatrix(format!(
                        "source value {:?} cannot be stored in the delimited format",
                        text
                    )));
                }
                if let SourceValue::Text(_) = value {
                    if text.parse::<i64>().is_ok() {
                        return Err(Error::InvalidMatrix(format!(
                            "text value {:?} would reload as an integer",
                            text
                        )));
                    }
                }
                write!(writer, ",{}", text)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

impl FromStr for Matrix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_reader(s.as_bytes(), 0)
    }
}

/// Incremental matrix authoring with last-write-wins re-assignment.
#[derive(Debug, Clone, Default)]
pub struct MatrixBuilder {
    assignments: BTreeMap<SourceValue, i64>,
    default_value: i64,
}

impl MatrixBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_value(mut self, default_value: i64) -> Self {
        self.default_value = default_value;
        self
    }

    /// Assign `value` to `destination_code`, moving it out of any earlier bucket.
    pub fn assign(&mut self, destination_code: i64, value: impl Into<SourceValue>) -> &mut Self {
        self.assignments.insert(value.into(), destination_code);
        self
    }

    pub fn unassign(&mut self, value: &SourceValue) -> &mut Self {
        self.assignments.remove(value);
        self
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Freeze into a [`Matrix`]. The result never holds duplicates.
    pub fn build(&self) -> Matrix {
        let mut matrix = Matrix::with_default(self.default_value);
        for (value, code) in &self.assignments {
            matrix
                .buckets
                .entry(*code)
                .or_default()
                .insert(value.clone());
        }
        matrix
    }

    /// Freeze and validate against the enumerated source values.
    pub fn build_validated(&self, against: &BTreeSet<SourceValue>) -> Result<Matrix> {
        let matrix = self.build();
        matrix.validate(against)?;
        Ok(matrix)
    }
}
