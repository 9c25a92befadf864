//! Group reports end to end: configuring through the edit session, storing
//! as flat properties, pivoting and comparing, and the permission gates.

use perfrepo::app::{GroupReportEditor, GroupReportUseCase};
use perfrepo::report::{ReportConfig, ThresholdColor};
use perfrepo::types::{
    AccessLevel, AccessType, Direction, MeasuredValue, Metric, NewExecution, NewTest, Permission,
};
use perfrepo::{
    Error, ExecutionService, Repository, SecurityError, SessionContext, SystemClock, TestService,
    render_markdown,
};
use std::collections::BTreeMap;
use time::Duration;
use time::macros::datetime;

fn session() -> SessionContext {
    SessionContext::new("alice", ["perf"])
}

fn value(metric: &str, result: f64) -> MeasuredValue {
    MeasuredValue {
        metric: metric.into(),
        result,
        parameters: BTreeMap::new(),
    }
}

/// Test `t1` measuring latency and throughput, one baseline run
/// (latency 100) and one candidate run (latency 80).
fn seeded_repo() -> Repository {
    let repo = Repository::new();
    let t0 = datetime!(2024-06-01 00:00:00 UTC);

    TestService::new(repo.clone())
        .create_test(
            &session(),
            NewTest {
                uid: "t1".into(),
                name: "Echo socket".into(),
                group: "perf".into(),
                description: None,
                metrics: vec![
                    Metric {
                        name: "latency".into(),
                        direction: Direction::Lower,
                        description: None,
                    },
                    Metric {
                        name: "throughput".into(),
                        direction: Direction::Higher,
                        description: None,
                    },
                ],
            },
        )
        .unwrap();

    let executions = ExecutionService::new(repo.clone(), SystemClock);
    for (i, (tag, latency)) in [("baseline", 100.0), ("candidate", 80.0)]
        .into_iter()
        .enumerate()
    {
        executions
            .create_execution(
                &session(),
                NewExecution {
                    test_uid: "t1".into(),
                    name: format!("run-{tag}"),
                    started: Some(t0 + Duration::hours(i as i64)),
                    comment: None,
                    tags: vec![tag.to_string()],
                    parameters: Vec::new(),
                    values: vec![value("latency", latency)],
                },
            )
            .unwrap();
    }

    repo
}

/// Configure baseline-vs-candidate on latency through the editor and
/// persist it.
fn save_report(repo: &Repository) -> perfrepo::Report {
    let mut editor = GroupReportEditor::begin(repo.clone(), ReportConfig::default());
    editor.add_test("t1").unwrap();
    editor.add_tags("baseline");
    editor.add_tags("candidate");
    editor.add_comparison("baseline", "candidate");
    editor.set_metrics(vec!["latency".into()]);
    let config = editor.commit();

    GroupReportUseCase::new(repo.clone())
        .save(&session(), "Latency check", &config, Vec::new(), None)
        .unwrap()
}

#[test]
fn baseline_against_candidate_yields_plus_25_percent() {
    let repo = seeded_repo();
    let report = save_report(&repo);

    // the stored document is the flat 1-based property map
    let expected: BTreeMap<String, String> = [
        ("tests", "t1"),
        ("tag.1", "baseline"),
        ("tag.2", "candidate"),
        ("compare.1.1", "baseline"),
        ("compare.1.2", "candidate"),
        ("compare.1.alias", "candidate vs. baseline"),
        ("metrics", "latency"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(report.properties, expected);

    let view = GroupReportUseCase::new(repo)
        .load(&session(), report.id)
        .unwrap();
    assert_eq!(view.name, "Latency check");

    let comparison = &view.comparisons[0];
    assert_eq!(comparison.label, "candidate vs. baseline");
    assert_eq!(comparison.left, Some(100.0));
    assert_eq!(comparison.right, Some(80.0));
    assert!((comparison.delta.unwrap() - 25.0).abs() < 1e-9);
    assert_eq!(comparison.color, ThresholdColor::Green);

    let md = render_markdown(&view);
    assert!(md.starts_with("# Latency check\n"));
    assert!(md.contains("## `t1`"));
    assert!(md.contains("🟢 +25.00%"));
}

#[test]
fn stored_reports_survive_the_snapshot_round_trip() {
    let repo = seeded_repo();
    let report = save_report(&repo);

    let snapshot = repo.snapshot().unwrap();
    let restored = Repository::from_snapshot(snapshot).unwrap();

    let view = GroupReportUseCase::new(restored)
        .load(&session(), report.id)
        .unwrap();
    assert_eq!(view.config, ReportConfig::decode(&report.properties));
    assert!((view.comparisons[0].delta.unwrap() - 25.0).abs() < 1e-9);
}

#[test]
fn alias_renames_follow_into_stored_comparisons() {
    let repo = seeded_repo();
    let report = save_report(&repo);
    let use_case = GroupReportUseCase::new(repo.clone());

    // point the comparison at an alias instead of the raw label
    let mut editor = GroupReportEditor::begin(repo.clone(), ReportConfig::decode(&report.properties));
    editor.set_tag_alias("baseline", Some("base".into()));
    editor.remove_comparison("candidate vs. baseline");
    editor.add_comparison("base", "candidate");
    let config = editor.commit();
    use_case
        .save(&session(), "Latency check", &config, Vec::new(), Some(report.id))
        .unwrap();

    // renaming the alias rewrites the comparison slot on commit
    let stored = use_case.load(&session(), report.id).unwrap().config;
    let mut editor = GroupReportEditor::begin(repo.clone(), stored);
    editor.set_tag_alias("baseline", Some("better-base".into()));
    let config = editor.commit();
    assert_eq!(config.comparisons[0].left, "better-base");

    use_case
        .save(&session(), "Latency check", &config, Vec::new(), Some(report.id))
        .unwrap();
    let view = use_case.load(&session(), report.id).unwrap();
    assert_eq!(view.columns[0], "better-base");
    // the comparison still resolves through the new alias
    assert!((view.comparisons[0].delta.unwrap() - 25.0).abs() < 1e-9);
}

#[test]
fn report_access_is_enforced_per_user() {
    let repo = seeded_repo();
    let report = save_report(&repo);
    let use_case = GroupReportUseCase::new(repo.clone());

    let stranger = SessionContext::new("bob", ["storage"]);
    let err = use_case.load(&stranger, report.id).unwrap_err();
    assert!(matches!(
        err,
        Error::Security(SecurityError::ReadDenied { .. })
    ));

    // a public read grant opens the view but not the save path
    let config = ReportConfig::decode(&report.properties);
    use_case
        .save(
            &session(),
            "Latency check",
            &config,
            vec![Permission {
                access_type: AccessType::Read,
                level: AccessLevel::Public,
                user: None,
                group: None,
            }],
            Some(report.id),
        )
        .unwrap();

    assert!(use_case.load(&stranger, report.id).is_ok());
    let err = use_case
        .save(&stranger, "Hijacked", &config, Vec::new(), Some(report.id))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Security(SecurityError::WriteDenied { .. })
    ));
}
