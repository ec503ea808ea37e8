//! Descriptive statistics over fetched spreadsheet rows.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Summary statistics for a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; absent when fewer than two values.
    pub std: Option<f64>,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

/// Summary statistics for a categorical (non-numeric) column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalSummary {
    pub count: usize,
    pub unique: usize,
    /// Most frequent value; ties resolve to the first one seen.
    pub top: Option<String>,
    pub freq: usize,
}

/// Structured result of summarizing a table.
///
/// A structural problem with the input is reported through the `error`
/// marker, never as a fault — callers branch on the marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub numerical: BTreeMap<String, NumericSummary>,
    pub categorical: BTreeMap<String, CategoricalSummary>,
}

impl AnalysisReport {
    fn with_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Computes per-column descriptive statistics.
///
/// The first row is the header, the remainder are data rows. A column is
/// numeric when it has at least one non-empty cell and every non-empty
/// cell parses as a number; everything else is categorical. Empty cells
/// are treated as missing, and rows shorter than the header are padded
/// with missing values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Summarizer;

impl Summarizer {
    pub fn new() -> Self {
        Self
    }

    pub fn summarize(&self, rows: &[Vec<String>]) -> AnalysisReport {
        let Some((header, data)) = rows.split_first() else {
            return AnalysisReport::with_error("No data");
        };
        if data.is_empty() {
            return AnalysisReport::with_error("no rows after header");
        }

        let mut report = AnalysisReport::default();

        for (index, name) in header.iter().enumerate() {
            let values: Vec<&str> = data
                .iter()
                .map(|row| row.get(index).map(String::as_str).unwrap_or(""))
                .filter(|cell| !cell.trim().is_empty())
                .collect();

            let parsed: Vec<f64> = values
                .iter()
                .filter_map(|cell| cell.trim().parse::<f64>().ok())
                .filter(|value| value.is_finite())
                .collect();

            if !parsed.is_empty() && parsed.len() == values.len() {
                report
                    .numerical
                    .insert(name.clone(), summarize_numeric(&parsed));
            } else {
                report
                    .categorical
                    .insert(name.clone(), summarize_categorical(&values));
            }
        }

        report
    }
}

fn summarize_numeric(values: &[f64]) -> NumericSummary {
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;

    let std = if count > 1 {
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        Some(variance.sqrt())
    } else {
        None
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    NumericSummary {
        count,
        mean,
        std,
        min: sorted[0],
        p25: percentile(&sorted, 0.25),
        p50: percentile(&sorted, 0.50),
        p75: percentile(&sorted, 0.75),
        max: sorted[count - 1],
    }
}

fn summarize_categorical(values: &[&str]) -> CategoricalSummary {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (seen_at, value) in values.iter().enumerate() {
        let entry = counts.entry(value).or_insert((0, seen_at));
        entry.0 += 1;
    }

    let top = counts
        .iter()
        .min_by_key(|(_, (count, first_seen))| (std::cmp::Reverse(*count), *first_seen))
        .map(|(value, (count, _))| (value.to_string(), *count));

    CategoricalSummary {
        count: values.len(),
        unique: counts.len(),
        freq: top.as_ref().map(|(_, count)| *count).unwrap_or(0),
        top: top.map(|(value, _)| value),
    }
}

/// Linear-interpolated percentile over an ascending slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let last = sorted.len() - 1;
    let rank = p * last as f64;
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    if low == high {
        return sorted[low];
    }
    let weight = rank - low as f64;
    sorted[low] * (1.0 - weight) + sorted[high] * weight
}
