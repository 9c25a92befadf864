//! Batteries-included facade over the perfrepo crates.
//!
//! Embedders that want the whole system depend on this crate and get the
//! in-memory store, the services, and the report engine under one roof.
//! The member crates stay usable on their own for callers who only need a
//! slice (`perfrepo-report` for the aggregation math, `perfrepo-types` for
//! the wire structs).

pub use perfrepo_app as app;
pub use perfrepo_error as error;
pub use perfrepo_report as report;
pub use perfrepo_store as store;
pub use perfrepo_types as types;

pub use perfrepo_app::{
    Clock, ExecutionService, GroupReportUseCase, ReportService, SystemClock, TestService,
    render_markdown,
};
pub use perfrepo_error::{Error, SecurityError, ServiceError, StoreError};
pub use perfrepo_store::{ExecutionSearchCriteria, Repository};
pub use perfrepo_types::{
    Report, SessionContext, Snapshot, Test, TestExecution,
};

#[cfg(test)]
mod tests {
    use super::*;
    use perfrepo_types::{Direction, MeasuredValue, Metric, NewExecution, NewTest};

    // everything the facade re-exports is reachable without naming a
    // member crate
    #[test]
    fn facade_covers_the_record_and_search_path() {
        let repo = Repository::new();
        let session = SessionContext::new("alice", ["perf"]);

        TestService::new(repo.clone())
            .create_test(
                &session,
                NewTest {
                    uid: "echo".into(),
                    name: "Echo".into(),
                    group: "perf".into(),
                    description: None,
                    metrics: vec![Metric {
                        name: "throughput".into(),
                        direction: Direction::Higher,
                        description: None,
                    }],
                },
            )
            .unwrap();

        let executions = ExecutionService::new(repo.clone(), SystemClock);
        executions
            .create_execution(
                &session,
                NewExecution {
                    test_uid: "echo".into(),
                    name: "run-1".into(),
                    started: None,
                    comment: None,
                    tags: vec!["nightly".into()],
                    parameters: Vec::new(),
                    values: vec![MeasuredValue {
                        metric: "throughput".into(),
                        result: 1250.0,
                        parameters: Default::default(),
                    }],
                },
            )
            .unwrap();

        let criteria = ExecutionSearchCriteria {
            tag_query: Some("nightly".into()),
            ..Default::default()
        };
        let hits = executions.search(&criteria, &session).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "run-1");
    }
}
