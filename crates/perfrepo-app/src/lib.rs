//! Application layer for perfrepo.
//!
//! Services coordinate the store and the aggregation logic. They do not
//! parse CLI flags and they do not touch the filesystem.

use time::OffsetDateTime;

pub mod catalog;
pub mod executions;
pub mod reports;

pub use catalog::TestService;
pub use executions::{ExecutionDetail, ExecutionService};
pub use reports::{
    ComparisonRow, GroupReportEditor, GroupReportUseCase, GroupReportView, MatrixRow,
    ReportService,
};

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

// ----------------------------
// Rendering helpers
// ----------------------------

pub fn render_markdown(view: &GroupReportView) -> String {
    let mut out = String::new();

    if view.name.is_empty() {
        out.push_str("# Group report\n\n");
    } else {
        out.push_str(&format!("# {}\n\n", view.name));
    }
    out.push_str(&format!("**Threshold:** {:.2}%\n\n", view.threshold));

    let mut uids: Vec<&str> = Vec::new();
    for row in &view.rows {
        if !uids.contains(&row.test_uid.as_str()) {
            uids.push(&row.test_uid);
        }
    }

    for uid in &uids {
        out.push_str(&format!("## `{uid}`\n\n"));

        out.push_str("| metric |");
        for column in &view.columns {
            out.push_str(&format!(" {column} |"));
        }
        out.push_str("\n|---|");
        for _ in &view.columns {
            out.push_str("---:|");
        }
        out.push('\n');

        for metric in &view.metrics {
            out.push_str(&format!("| `{metric}` |"));
            for column in &view.columns {
                let best = view
                    .rows
                    .iter()
                    .find(|r| r.test_uid == *uid && r.column == *column && r.metric == *metric)
                    .and_then(|r| r.best);
                out.push_str(&format!(" {} |", format_value(best)));
            }
            out.push('\n');
        }
        out.push('\n');

        let comparisons: Vec<&ComparisonRow> = view
            .comparisons
            .iter()
            .filter(|c| c.test_uid == *uid)
            .collect();
        if !comparisons.is_empty() {
            out.push_str("| comparison | metric | left | right | delta |\n");
            out.push_str("|---|---|---:|---:|---:|\n");
            for row in comparisons {
                out.push_str(&format!(
                    "| {label} | `{metric}` | {left} | {right} | {dot} {delta} |\n",
                    label = row.label,
                    metric = row.metric,
                    left = format_value(row.left),
                    right = format_value(row.right),
                    dot = color_dot(row.color),
                    delta = format_delta(row.delta),
                ));
            }
            out.push('\n');
        }
    }

    out
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "n/a".to_string(),
    }
}

fn format_delta(delta: Option<f64>) -> String {
    match delta {
        Some(d) => {
            let sign = if d > 0.0 { "+" } else { "" };
            format!("{sign}{d:.2}%")
        }
        None => "n/a".to_string(),
    }
}

fn color_dot(color: perfrepo_report::ThresholdColor) -> &'static str {
    match color {
        perfrepo_report::ThresholdColor::Green => "🟢",
        perfrepo_report::ThresholdColor::Orange => "🟠",
        perfrepo_report::ThresholdColor::Red => "🔴",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfrepo_report::{ReportConfig, ThresholdColor};

    fn view() -> GroupReportView {
        GroupReportView {
            id: None,
            name: "Socket regressions".into(),
            threshold: -5.0,
            config: ReportConfig::default(),
            columns: vec!["baseline".into(), "candidate".into()],
            metrics: vec!["throughput".into()],
            rows: vec![
                MatrixRow {
                    test_uid: "echo".into(),
                    column: "baseline".into(),
                    metric: "throughput".into(),
                    samples: vec![100.0],
                    best: Some(100.0),
                },
                MatrixRow {
                    test_uid: "echo".into(),
                    column: "candidate".into(),
                    metric: "throughput".into(),
                    samples: vec![],
                    best: None,
                },
            ],
            comparisons: vec![ComparisonRow {
                test_uid: "echo".into(),
                label: "candidate vs. baseline".into(),
                metric: "throughput".into(),
                left: Some(100.0),
                right: Some(120.0),
                delta: Some(-16.666_666_666_666_668),
                color: ThresholdColor::Red,
            }],
        }
    }

    #[test]
    fn markdown_contains_title_matrix_and_comparison() {
        let md = render_markdown(&view());
        assert!(md.starts_with("# Socket regressions\n"));
        assert!(md.contains("**Threshold:** -5.00%"));
        assert!(md.contains("## `echo`"));
        assert!(md.contains("| `throughput` | 100.00 | n/a |"));
        assert!(md.contains("🔴 -16.67%"));
    }

    #[test]
    fn markdown_formats_positive_deltas_with_a_sign() {
        let mut v = view();
        v.comparisons[0].delta = Some(25.0);
        v.comparisons[0].color = ThresholdColor::Green;
        let md = render_markdown(&v);
        assert!(md.contains("🟢 +25.00%"));
    }

    #[test]
    fn markdown_with_no_rows_is_just_the_header() {
        let v = GroupReportView {
            rows: Vec::new(),
            comparisons: Vec::new(),
            columns: Vec::new(),
            metrics: Vec::new(),
            ..view()
        };
        let md = render_markdown(&v);
        assert!(!md.contains("##"));
    }
}
