//! Recording executions and finding them again: criteria search, ranked
//! windows, metric history, and the snapshot file round trip.

use perfrepo::store::{LastWindow, ParamCriterion};
use perfrepo::types::{
    Direction, GroupFilter, MeasuredValue, Metric, NewExecution, NewTest, Parameter,
    Snapshot,
};
use perfrepo::{
    ExecutionSearchCriteria, ExecutionService, Repository, SessionContext, SystemClock,
    TestService,
};
use std::collections::BTreeMap;
use std::fs;
use time::Duration;
use time::macros::datetime;

fn session() -> SessionContext {
    SessionContext::new("alice", ["perf"])
}

fn metric(name: &str, direction: Direction) -> Metric {
    Metric {
        name: name.into(),
        direction,
        description: None,
    }
}

fn value(metric: &str, result: f64) -> MeasuredValue {
    MeasuredValue {
        metric: metric.into(),
        result,
        parameters: BTreeMap::new(),
    }
}

/// One perf-owned test with six runs (even runs nightly, odd runs hourly,
/// run-3 additionally broken) and one storage-owned test with a single
/// nightly run.
fn seeded_repo() -> Repository {
    let repo = Repository::new();
    let tests = TestService::new(repo.clone());
    let executions = ExecutionService::new(repo.clone(), SystemClock);
    let t0 = datetime!(2024-06-01 00:00:00 UTC);

    tests
        .create_test(
            &session(),
            NewTest {
                uid: "echo-socket".into(),
                name: "Echo socket".into(),
                group: "perf".into(),
                description: None,
                metrics: vec![
                    metric("throughput", Direction::Higher),
                    metric("latency", Direction::Lower),
                ],
            },
        )
        .unwrap();

    for i in 0..6u32 {
        let mut tags = vec![if i % 2 == 0 { "nightly" } else { "hourly" }.to_string()];
        if i == 3 {
            tags.push("broken".into());
        }
        let os = if i < 3 { "Fedora-40" } else { "RHEL-9" };
        executions
            .create_execution(
                &session(),
                NewExecution {
                    test_uid: "echo-socket".into(),
                    name: format!("run-{i}"),
                    started: Some(t0 + Duration::hours(i64::from(i))),
                    comment: None,
                    tags,
                    parameters: vec![Parameter {
                        name: "os".into(),
                        value: os.into(),
                    }],
                    values: vec![
                        value("throughput", 100.0 + 10.0 * f64::from(i)),
                        value("latency", 20.0 - f64::from(i)),
                    ],
                },
            )
            .unwrap();
    }

    let storage = SessionContext::new("bob", ["storage"]);
    tests
        .create_test(
            &storage,
            NewTest {
                uid: "iscsi".into(),
                name: "iSCSI".into(),
                group: "storage".into(),
                description: None,
                metrics: vec![metric("throughput", Direction::Higher)],
            },
        )
        .unwrap();
    executions
        .create_execution(
            &storage,
            NewExecution {
                test_uid: "iscsi".into(),
                name: "iscsi-run".into(),
                started: Some(t0 + Duration::hours(10)),
                comment: None,
                tags: vec!["nightly".into()],
                parameters: Vec::new(),
                values: vec![value("throughput", 50.0)],
            },
        )
        .unwrap();

    repo
}

fn names(hits: &[perfrepo::TestExecution]) -> Vec<&str> {
    hits.iter().map(|e| e.name.as_str()).collect()
}

#[test]
fn criteria_search_narrows_by_tags_groups_and_parameters() {
    let repo = seeded_repo();
    let executions = ExecutionService::new(repo, SystemClock);

    let mut criteria = ExecutionSearchCriteria {
        tag_query: Some("nightly -broken".into()),
        ..Default::default()
    };
    let hits = executions.search(&criteria, &session()).unwrap();
    assert_eq!(names(&hits), ["run-0", "run-2", "run-4", "iscsi-run"]);

    criteria.group_filter = GroupFilter::MyGroups;
    let hits = executions.search(&criteria, &session()).unwrap();
    assert_eq!(names(&hits), ["run-0", "run-2", "run-4"]);

    criteria.parameters = vec![ParamCriterion {
        name: "os".into(),
        value: Some("Fedora%".into()),
        displayed: true,
    }];
    let hits = executions.search(&criteria, &session()).unwrap();
    assert_eq!(names(&hits), ["run-0", "run-2"]);
    // only the displayed parameter is attached to the results
    assert_eq!(hits[0].parameters.len(), 1);
    assert_eq!(hits[0].parameters[0].value, "Fedora-40");
}

#[test]
fn windowed_search_selects_the_ranked_slice() {
    let repo = seeded_repo();
    let executions = ExecutionService::new(repo, SystemClock);

    let criteria = ExecutionSearchCriteria {
        test_uid: Some("echo-*".into()),
        ..Default::default()
    };
    let hits = executions
        .search_last(
            &criteria,
            LastWindow {
                last_from: 4,
                how_many: 2,
            },
            &session(),
        )
        .unwrap();
    assert_eq!(names(&hits), ["run-2", "run-3"]);

    // asking further back than the result set clamps to its start
    let hits = executions
        .search_last(
            &criteria,
            LastWindow {
                last_from: 100,
                how_many: 2,
            },
            &session(),
        )
        .unwrap();
    assert_eq!(names(&hits), ["run-0", "run-1"]);
}

#[test]
fn metric_history_is_newest_first_within_the_tag_scope() {
    let repo = seeded_repo();
    let executions = ExecutionService::new(repo, SystemClock);

    let points = executions
        .metric_history("echo-socket", "throughput", &["nightly".to_string()], 2)
        .unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].value, 140.0);
    assert_eq!(points[1].value, 120.0);
}

#[test]
fn snapshot_file_round_trip_preserves_search_results() {
    let repo = seeded_repo();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("perfrepo.json");

    let snapshot = repo.snapshot().unwrap();
    fs::write(&path, serde_json::to_vec_pretty(&snapshot).unwrap()).unwrap();

    let loaded: Snapshot = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    let restored = Repository::from_snapshot(loaded).unwrap();
    let executions = ExecutionService::new(restored.clone(), SystemClock);

    let criteria = ExecutionSearchCriteria {
        tag_query: Some("nightly -broken".into()),
        ..Default::default()
    };
    let hits = executions.search(&criteria, &session()).unwrap();
    assert_eq!(names(&hits), ["run-0", "run-2", "run-4", "iscsi-run"]);

    // id sequences resume past the loaded rows
    let next = executions
        .create_execution(
            &session(),
            NewExecution {
                test_uid: "echo-socket".into(),
                name: "run-6".into(),
                started: None,
                comment: None,
                tags: vec!["nightly".into()],
                parameters: Vec::new(),
                values: vec![value("throughput", 170.0)],
            },
        )
        .unwrap();
    assert_eq!(next.id.0, 8);
}
