//! Report aggregation for perfrepo.
//!
//! This crate is intentionally I/O-free: it pivots executions into cells and
//! compares cells. Loading executions and persisting report documents is the
//! caller's job.

use perfrepo_types::{Direction, MeasuredValue, Test, TestExecution};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub mod config;
pub mod session;

pub use config::{ComparisonDef, REPORT_TYPE_TEST_GROUP, ReportConfig, TagSelector};
pub use session::ReportEditSession;

/// Comparison delta below this many percent is flagged red unless the caller
/// picks another threshold.
pub const DEFAULT_COMPARISON_THRESHOLD: f64 = -5.0;

/// Canonical column label for a tag combination: tokens sorted and joined
/// with single spaces. Duplicates are kept; `["b", "a", "b"]` and
/// `["a", "b"]` are different columns.
pub fn normalize_tag_label(tags: &[String]) -> String {
    let mut sorted = tags.to_vec();
    sorted.sort();
    sorted.join(" ")
}

// ----------------------------------------------------------------------------
// pivot table
// ----------------------------------------------------------------------------

/// Column coordinate inside one test's row: which tag column, which metric.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ColumnKey {
    pub tag_label: String,
    pub metric: String,
}

/// All measured values that landed in one cell, plus the best one according
/// to the metric's direction. The first value seen wins ties.
#[derive(Debug, Clone, Default)]
pub struct ValueCell {
    values: Vec<MeasuredValue>,
    best: Option<MeasuredValue>,
}

impl ValueCell {
    pub fn add(&mut self, value: MeasuredValue, direction: Direction) {
        let better = match &self.best {
            Some(best) => direction.prefers(value.result, best.result),
            None => true,
        };
        if better {
            self.best = Some(value.clone());
        }
        self.values.push(value);
    }

    pub fn values(&self) -> &[MeasuredValue] {
        &self.values
    }

    pub fn best(&self) -> Option<&MeasuredValue> {
        self.best.as_ref()
    }
}

/// Direction lookup for metric names. Unknown metrics fall back to
/// [`Direction::Higher`].
#[derive(Debug, Clone, Default)]
pub struct MetricDirections(BTreeMap<String, Direction>);

impl MetricDirections {
    pub fn from_tests(tests: &[Test]) -> MetricDirections {
        let mut map = BTreeMap::new();
        for test in tests {
            for metric in &test.metrics {
                map.entry(metric.name.clone()).or_insert(metric.direction);
            }
        }
        MetricDirections(map)
    }

    pub fn get(&self, metric: &str) -> Direction {
        self.0.get(metric).copied().unwrap_or(Direction::Higher)
    }
}

/// Executions pivoted by test UID and column coordinate.
///
/// `discovered_tags` lists tag labels seen in the data but absent from the
/// report configuration, in first-seen order. `metrics` is the catalog of
/// every metric name any execution carried, also first-seen, regardless of
/// which metrics the configuration selects.
#[derive(Debug, Clone, Default)]
pub struct PivotTable {
    pub rows: BTreeMap<String, BTreeMap<ColumnKey, ValueCell>>,
    pub discovered_tags: Vec<String>,
    pub metrics: Vec<String>,
}

impl PivotTable {
    pub fn cell(&self, test_uid: &str, tag_label: &str, metric: &str) -> Option<&ValueCell> {
        self.rows.get(test_uid)?.get(&ColumnKey {
            tag_label: tag_label.to_string(),
            metric: metric.to_string(),
        })
    }
}

/// Group executions into a [`PivotTable`] under the report configuration.
///
/// Cell columns use display labels (alias-resolved); discovery tracks the raw
/// normalized label. Values whose metric is not selected still register in
/// the metric catalog but land in no cell; an empty selection selects all.
pub fn pivot(
    executions: &[TestExecution],
    config: &ReportConfig,
    directions: &MetricDirections,
) -> PivotTable {
    let configured: BTreeSet<&str> = config.tags.iter().map(|s| s.label.as_str()).collect();
    let mut table = PivotTable::default();
    for exec in executions {
        let raw = normalize_tag_label(&exec.tags);
        if !configured.contains(raw.as_str()) && !table.discovered_tags.contains(&raw) {
            table.discovered_tags.push(raw.clone());
        }
        let display = config.tag_alias(&raw).unwrap_or(&raw).to_string();
        for value in &exec.values {
            if !table.metrics.contains(&value.metric) {
                table.metrics.push(value.metric.clone());
            }
            if !config.metrics.is_empty() && !config.metrics.contains(&value.metric) {
                continue;
            }
            table
                .rows
                .entry(exec.test_uid.clone())
                .or_default()
                .entry(ColumnKey {
                    tag_label: display.clone(),
                    metric: value.metric.clone(),
                })
                .or_default()
                .add(value.clone(), directions.get(&value.metric));
        }
    }
    table
}

// ----------------------------------------------------------------------------
// comparisons
// ----------------------------------------------------------------------------

/// Percentage delta between the best values of two columns:
/// `(left - right) * 100 / right`. `None` when either cell has no value.
pub fn try_compare(
    table: &PivotTable,
    test_uid: &str,
    left_label: &str,
    right_label: &str,
    metric: &str,
) -> Option<f64> {
    let left = table.cell(test_uid, left_label, metric)?.best()?;
    let right = table.cell(test_uid, right_label, metric)?.best()?;
    Some((left.result - right.result) * 100.0 / right.result)
}

/// Like [`try_compare`] but reports a missing side as a delta of zero.
pub fn compare(
    table: &PivotTable,
    test_uid: &str,
    left_label: &str,
    right_label: &str,
    metric: &str,
) -> f64 {
    try_compare(table, test_uid, left_label, right_label, metric).unwrap_or(0.0)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdColor {
    Green,
    Orange,
    Red,
}

impl ThresholdColor {
    /// Positive deltas are green, deltas below the threshold are red, the
    /// band in between (zero included) is orange.
    pub fn classify(delta: f64, threshold: f64) -> ThresholdColor {
        if delta > 0.0 {
            ThresholdColor::Green
        } else if delta < threshold {
            ThresholdColor::Red
        } else {
            ThresholdColor::Orange
        }
    }
}
