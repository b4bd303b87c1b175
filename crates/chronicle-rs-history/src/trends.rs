//! Read-only statistics over a history snapshot.

use crate::model::Record;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Aggregate over one numeric metadata field.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct NumericSummary {
    pub field: String,
    /// Records carrying a numeric value for the field.
    pub present: usize,
    /// Records without the field, or with a non-numeric value.
    pub missing: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Occurrences of one categorical value.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CategoryCount {
    pub value: String,
    pub count: usize,
}

/// Frequency distribution over one categorical metadata field.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct CategoricalSummary {
    pub field: String,
    /// Counts in first-seen order.
    pub distribution: Vec<CategoryCount>,
    pub missing: usize,
    /// Highest count; ties go to the value seen first.
    pub most_common: Option<String>,
}

impl CategoricalSummary {
    /// Count for a single value, zero when never seen.
    pub fn count_of(&self, value: &str) -> usize {
        self.distribution
            .iter()
            .find(|entry| entry.value == value)
            .map_or(0, |entry| entry.count)
    }

    /// Distribution keyed by value.
    pub fn as_map(&self) -> BTreeMap<String, usize> {
        self.distribution
            .iter()
            .map(|entry| (entry.value.clone(), entry.count))
            .collect()
    }
}

/// Statistics computed fresh on every call.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct TrendSnapshot {
    pub count: usize,
    pub numeric: Option<NumericSummary>,
    pub categorical: Option<CategoricalSummary>,
}

/// Summarizes record snapshots for the analytics-style tools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrendAggregator {
    numeric_field: Option<String>,
    categorical_field: Option<String>,
}

impl TrendAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numeric_field(mut self, field: Option<String>) -> Self {
        self.numeric_field = field;
        self
    }

    pub fn with_categorical_field(mut self, field: Option<String>) -> Self {
        self.categorical_field = field;
        self
    }

    pub fn summarize(&self, records: &[Record]) -> TrendSnapshot {
        summarize(
            records,
            self.numeric_field.as_deref(),
            self.categorical_field.as_deref(),
        )
    }
}

/// Pure aggregation over `records`. Empty input yields a zeroed snapshot.
pub fn summarize(
    records: &[Record],
    numeric_field: Option<&str>,
    categorical_field: Option<&str>,
) -> TrendSnapshot {
    TrendSnapshot {
        count: records.len(),
        numeric: numeric_field.map(|field| summarize_numeric(records, field)),
        categorical: categorical_field.map(|field| summarize_categorical(records, field)),
    }
}

fn summarize_numeric(records: &[Record], field: &str) -> NumericSummary {
    let values: Vec<f64> = records
        .iter()
        .filter_map(|record| record.metadata_value(field).and_then(|value| value.as_f64()))
        .collect();
    let present = values.len();
    let mean = (present > 0).then(|| values.iter().sum::<f64>() / present as f64);
    NumericSummary {
        field: field.to_string(),
        present,
        missing: records.len() - present,
        mean,
        min: values.iter().copied().reduce(f64::min),
        max: values.iter().copied().reduce(f64::max),
    }
}

fn summarize_categorical(records: &[Record], field: &str) -> CategoricalSummary {
    let mut distribution: Vec<CategoryCount> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut missing = 0;
    for record in records {
        let Some(value) = record.metadata_value(field) else {
            missing += 1;
            continue;
        };
        let value = value.to_string();
        match positions.get(&value) {
            Some(&idx) => distribution[idx].count += 1,
            None => {
                positions.insert(value.clone(), distribution.len());
                distribution.push(CategoryCount { value, count: 1 });
            }
        }
    }

    let mut most_common: Option<&CategoryCount> = None;
    for entry in &distribution {
        if most_common.is_none_or(|best| entry.count > best.count) {
            most_common = Some(entry);
        }
    }
    let most_common = most_common.map(|entry| entry.value.clone());

    CategoricalSummary {
        field: field.to_string(),
        distribution,
        missing,
        most_common,
    }
}
