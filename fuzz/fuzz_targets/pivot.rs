#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use perfrepo_report::{
    ComparisonDef, MetricDirections, ReportConfig, TagSelector, ThresholdColor, pivot,
    try_compare,
};
use perfrepo_types::{ExecutionId, MeasuredValue, TestExecution, TestId};
use std::collections::BTreeMap;
use time::OffsetDateTime;

// Small closed alphabets keep the corpus focused on the aggregation logic
// instead of string shapes.
fn metric_name(ix: u8) -> String {
    format!("m{}", ix % 4)
}

fn tag_name(ix: u8) -> String {
    format!("t{}", ix % 6)
}

fn test_uid(ix: u8) -> String {
    format!("test-{}", ix % 3)
}

#[derive(Arbitrary, Debug)]
struct FuzzValue {
    metric: u8,
    result: f64,
}

#[derive(Arbitrary, Debug)]
struct FuzzExecution {
    id: u16,
    test: u8,
    started_secs: u32,
    tags: Vec<u8>,
    values: Vec<FuzzValue>,
}

#[derive(Arbitrary, Debug)]
struct FuzzSelector {
    tags: Vec<u8>,
    alias: Option<u8>,
}

#[derive(Arbitrary, Debug)]
struct PivotInput {
    executions: Vec<FuzzExecution>,
    selectors: Vec<FuzzSelector>,
    comparisons: Vec<(u8, u8)>,
    metrics: Vec<u8>,
    threshold: f64,
}

fuzz_target!(|input: PivotInput| {
    let executions: Vec<TestExecution> = input
        .executions
        .iter()
        .take(32)
        .map(|e| TestExecution {
            id: ExecutionId(u64::from(e.id)),
            test_id: TestId(u64::from(e.test % 3)),
            test_uid: test_uid(e.test),
            name: format!("run-{}", e.id),
            started: OffsetDateTime::from_unix_timestamp(i64::from(e.started_secs))
                .expect("u32 seconds are in range"),
            comment: None,
            tags: e.tags.iter().take(4).map(|t| tag_name(*t)).collect(),
            parameters: Vec::new(),
            values: e
                .values
                .iter()
                .take(8)
                .map(|v| MeasuredValue {
                    metric: metric_name(v.metric),
                    // NaN cannot come in through a JSON snapshot
                    result: if v.result.is_nan() { 0.0 } else { v.result },
                    parameters: BTreeMap::new(),
                })
                .collect(),
        })
        .collect();

    let config = ReportConfig {
        tests: Vec::new(),
        tags: input
            .selectors
            .iter()
            .take(6)
            .map(|s| {
                let mut tags: Vec<String> =
                    s.tags.iter().take(4).map(|t| tag_name(*t)).collect();
                tags.sort();
                TagSelector {
                    label: tags.join(" "),
                    alias: s.alias.map(tag_name),
                }
            })
            .collect(),
        comparisons: input
            .comparisons
            .iter()
            .take(4)
            .map(|(left, right)| ComparisonDef {
                left: tag_name(*left),
                right: tag_name(*right),
                alias: None,
            })
            .collect(),
        metrics: input
            .metrics
            .iter()
            .take(4)
            .map(|m| metric_name(*m))
            .collect(),
    };

    let table = pivot(&executions, &config, &MetricDirections::default());

    // the best value of a cell is always one of its values
    for columns in table.rows.values() {
        for cell in columns.values() {
            if let Some(best) = cell.best() {
                assert!(cell.values().iter().any(|v| v.result == best.result));
            }
        }
    }

    let threshold = if input.threshold.is_nan() {
        -5.0
    } else {
        input.threshold
    };
    for uid in table.rows.keys() {
        for def in &config.comparisons {
            for metric in &table.metrics {
                if let Some(delta) = try_compare(&table, uid, &def.left, &def.right, metric) {
                    let _ = ThresholdColor::classify(delta, threshold);
                }
            }
        }
    }
});
