//! Per-value counts and the matrix summary derived from them

use std::collections::{BTreeMap, BTreeSet, HashMap};

use geoclass_core::raster::PixelBlock;
use geoclass_core::{Inverse, SourceValue};
use serde::Serialize;

/// Occurrences of each source value seen by a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueHistogram {
    counts: HashMap<SourceValue, u64>,
}

impl ValueHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Histogram of one raster block.
    pub fn of_block(block: &PixelBlock) -> Self {
        let mut ints: HashMap<i64, u64> = HashMap::new();
        block.for_each_key(|k| *ints.entry(k).or_insert(0) += 1);
        Self {
            counts: ints.into_iter().map(|(k, n)| (SourceValue::Int(k), n)).collect(),
        }
    }

    pub fn add(&mut self, value: SourceValue, count: u64) {
        *self.counts.entry(value).or_insert(0) += count;
    }

    pub fn merge(&mut self, other: ValueHistogram) {
        for (value, count) in other.counts {
            self.add(value, count);
        }
    }

    pub fn count(&self, value: &SourceValue) -> u64 {
        self.counts.get(value).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Values with a non-zero count, ascending.
    pub fn values(&self) -> BTreeSet<SourceValue> {
        self.counts
            .iter()
            .filter(|(_, &n)| n > 0)
            .map(|(v, _)| v.clone())
            .collect()
    }

    /// Counts in ascending value order.
    pub fn sorted(&self) -> BTreeMap<SourceValue, u64> {
        self.counts.iter().map(|(v, n)| (v.clone(), *n)).collect()
    }
}

/// Diagnostics attached to every result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatrixSummary {
    /// Distinct source values the matrix maps
    pub mapped_values: usize,
    /// Distinct destination codes in the output
    pub destination_codes: usize,
    /// Distinct source values that fell to the default value
    pub unmapped_values: usize,
    /// Pixels or features that received the default value, when counted
    pub default_count: Option<u64>,
}

impl MatrixSummary {
    /// Summary of a pass that counted every value it processed.
    ///
    /// Records without a key (null attributes) are passed as `keyless`.
    pub fn from_counts(inverse: &Inverse, histogram: &ValueHistogram, keyless: u64) -> Self {
        let mut codes = BTreeSet::new();
        let mut mapped = 0;
        let mut unmapped = 0;
        let mut default_count = keyless;

        for (value, count) in histogram.sorted() {
            match inverse.lookup(&value) {
                Some(code) => {
                    mapped += 1;
                    codes.insert(code);
                }
                None => {
                    unmapped += 1;
                    default_count += count;
                }
            }
        }
        if default_count > 0 {
            codes.insert(inverse.default_value());
        }

        Self {
            mapped_values: mapped,
            destination_codes: codes.len(),
            unmapped_values: unmapped,
            default_count: Some(default_count),
        }
    }

    /// Summary of a remote run, where values are not counted locally.
    ///
    /// With an enumeration at hand the unmapped values are known exactly;
    /// without one only the matrix side is reported.
    pub fn from_matrix(inverse: &Inverse, enumerated: Option<&BTreeSet<SourceValue>>) -> Self {
        let mut codes = inverse.destination_codes();
        let unmapped_values = match enumerated {
            Some(values) => {
                let unmapped = values.iter().filter(|v| !inverse.contains(v)).count();
                if unmapped > 0 {
                    codes.insert(inverse.default_value());
                }
                unmapped
            }
            None => 0,
        };
        let mapped_values = match enumerated {
            Some(values) => values.iter().filter(|v| inverse.contains(v)).count(),
            None => inverse.len(),
        };

        Self {
            mapped_values,
            destination_codes: codes.len(),
            unmapped_values,
            default_count: None,
        }
    }
}
