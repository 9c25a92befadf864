//! In-memory repository for perfrepo entities.
//!
//! Tables mirror the relational schema this store replaces: one `BTreeMap`
//! per entity plus side tables for tags, parameters, and measured values
//! keyed by execution id. Everything handed to a caller is an independently
//! owned clone; nothing can mutate shared state through a returned value.
//!
//! The store enforces row-level invariants (unique test UIDs, existing rows
//! on keyed mutations). Business validation lives in the service layer.

pub mod search;

pub use search::{ExecutionSearchCriteria, LastWindow, LikePattern, ParamCriterion, TagQuery};

use perfrepo_error::StoreError;
use perfrepo_types::{
    ExecutionId, MeasuredValue, Metric, NewTest, Parameter, Permission, Report, ReportId,
    SNAPSHOT_SCHEMA_V1, Snapshot, Test, TestExecution, TestId,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use time::OffsetDateTime;

/// Resolved execution insert. The caller has already looked up the owning
/// test and validated the values against its metrics.
#[derive(Debug, Clone)]
pub struct NewExecutionRecord {
    pub test_id: TestId,
    pub name: String,
    pub started: OffsetDateTime,
    pub comment: Option<String>,
    pub tags: Vec<String>,
    pub parameters: Vec<Parameter>,
    pub values: Vec<MeasuredValue>,
}

#[derive(Debug, Clone)]
pub struct NewReportRecord {
    pub name: String,
    pub report_type: String,
    pub username: String,
    pub properties: BTreeMap<String, String>,
    pub permissions: Vec<Permission>,
}

/// Execution row without its collections; those live in the side tables.
#[derive(Debug, Clone)]
pub(crate) struct ExecutionRow {
    pub(crate) id: ExecutionId,
    pub(crate) test_id: TestId,
    pub(crate) test_uid: String,
    pub(crate) name: String,
    pub(crate) started: OffsetDateTime,
    pub(crate) comment: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct Tables {
    last_test_id: u64,
    last_execution_id: u64,
    last_report_id: u64,

    pub(crate) tests: BTreeMap<TestId, Test>,
    pub(crate) tests_by_uid: BTreeMap<String, TestId>,
    pub(crate) executions: BTreeMap<ExecutionId, ExecutionRow>,
    pub(crate) tags: BTreeMap<ExecutionId, Vec<String>>,
    pub(crate) parameters: BTreeMap<ExecutionId, Vec<Parameter>>,
    pub(crate) values: BTreeMap<ExecutionId, Vec<MeasuredValue>>,
    pub(crate) reports: BTreeMap<ReportId, Report>,
}

/// Execution without collections, as the base fetch returns it.
pub(crate) fn base_execution(row: &ExecutionRow) -> TestExecution {
    TestExecution {
        id: row.id,
        test_id: row.test_id,
        test_uid: row.test_uid.clone(),
        name: row.name.clone(),
        started: row.started,
        comment: row.comment.clone(),
        tags: Vec::new(),
        parameters: Vec::new(),
        values: Vec::new(),
    }
}

/// Full hydration in discrete steps: base row, then parameters, tags, and
/// values from their side tables.
pub(crate) fn hydrated_execution(tables: &Tables, row: &ExecutionRow) -> TestExecution {
    let mut exec = base_execution(row);
    exec.parameters = tables.parameters.get(&row.id).cloned().unwrap_or_default();
    exec.tags = tables.tags.get(&row.id).cloned().unwrap_or_default();
    exec.values = tables.values.get(&row.id).cloned().unwrap_or_default();
    exec
}

/// Shared handle to the in-memory tables. Cloning the handle shares state;
/// all returned entities are deep copies.
#[derive(Debug, Clone, Default)]
pub struct Repository {
    inner: Arc<Mutex<Tables>>,
}

impl Repository {
    pub fn new() -> Repository {
        Repository::default()
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    // ----------------------------
    // Tests
    // ----------------------------

    pub fn insert_test(&self, new: NewTest) -> Result<Test, StoreError> {
        let mut tables = self.lock()?;
        if tables.tests_by_uid.contains_key(&new.uid) {
            return Err(StoreError::DuplicateTestUid { uid: new.uid });
        }
        tables.last_test_id += 1;
        let id = TestId(tables.last_test_id);
        let test = Test {
            id,
            uid: new.uid,
            name: new.name,
            group: new.group,
            description: new.description,
            metrics: new.metrics,
        };
        tables.tests_by_uid.insert(test.uid.clone(), id);
        tables.tests.insert(id, test.clone());
        Ok(test)
    }

    pub fn test(&self, id: TestId) -> Result<Option<Test>, StoreError> {
        Ok(self.lock()?.tests.get(&id).cloned())
    }

    pub fn test_by_uid(&self, uid: &str) -> Result<Option<Test>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .tests_by_uid
            .get(uid)
            .and_then(|id| tables.tests.get(id))
            .cloned())
    }

    pub fn tests(&self) -> Result<Vec<Test>, StoreError> {
        Ok(self.lock()?.tests.values().cloned().collect())
    }

    /// Appends a metric to an existing test. Name uniqueness is the
    /// service's concern.
    pub fn add_metric(&self, test_id: TestId, metric: Metric) -> Result<Test, StoreError> {
        let mut tables = self.lock()?;
        let test = tables
            .tests
            .get_mut(&test_id)
            .ok_or(StoreError::MissingTest { id: test_id.0 })?;
        test.metrics.push(metric);
        Ok(test.clone())
    }

    /// Removes a test and cascades to its executions and their side tables.
    pub fn remove_test(&self, id: TestId) -> Result<Option<Test>, StoreError> {
        let mut tables = self.lock()?;
        let Some(test) = tables.tests.remove(&id) else {
            return Ok(None);
        };
        tables.tests_by_uid.remove(&test.uid);
        let doomed: Vec<ExecutionId> = tables
            .executions
            .values()
            .filter(|row| row.test_id == id)
            .map(|row| row.id)
            .collect();
        for exec_id in doomed {
            tables.executions.remove(&exec_id);
            tables.tags.remove(&exec_id);
            tables.parameters.remove(&exec_id);
            tables.values.remove(&exec_id);
        }
        Ok(Some(test))
    }

    // ----------------------------
    // Executions
    // ----------------------------

    pub fn insert_execution(
        &self,
        record: NewExecutionRecord,
    ) -> Result<TestExecution, StoreError> {
        let mut tables = self.lock()?;
        let test_uid = tables
            .tests
            .get(&record.test_id)
            .ok_or(StoreError::MissingTest {
                id: record.test_id.0,
            })?
            .uid
            .clone();
        tables.last_execution_id += 1;
        let id = ExecutionId(tables.last_execution_id);
        let row = ExecutionRow {
            id,
            test_id: record.test_id,
            test_uid,
            name: record.name,
            started: record.started,
            comment: record.comment,
        };
        tables.tags.insert(id, record.tags);
        tables.parameters.insert(id, record.parameters);
        tables.values.insert(id, record.values);
        let exec = hydrated_execution(&tables, &row);
        tables.executions.insert(id, row);
        Ok(exec)
    }

    /// Base row only; tags, parameters and values hydrate separately.
    pub fn execution(&self, id: ExecutionId) -> Result<Option<TestExecution>, StoreError> {
        Ok(self.lock()?.executions.get(&id).map(base_execution))
    }

    pub fn execution_tags(&self, id: ExecutionId) -> Result<Vec<String>, StoreError> {
        Ok(self.lock()?.tags.get(&id).cloned().unwrap_or_default())
    }

    pub fn execution_parameters(&self, id: ExecutionId) -> Result<Vec<Parameter>, StoreError> {
        Ok(self.lock()?.parameters.get(&id).cloned().unwrap_or_default())
    }

    pub fn execution_values(&self, id: ExecutionId) -> Result<Vec<MeasuredValue>, StoreError> {
        Ok(self.lock()?.values.get(&id).cloned().unwrap_or_default())
    }

    pub fn executions_for_test(&self, test_id: TestId) -> Result<Vec<TestExecution>, StoreError> {
        let tables = self.lock()?;
        let mut out: Vec<TestExecution> = tables
            .executions
            .values()
            .filter(|row| row.test_id == test_id)
            .map(|row| hydrated_execution(&tables, row))
            .collect();
        out.sort_by(|a, b| (a.started, a.id).cmp(&(b.started, b.id)));
        Ok(out)
    }

    pub fn remove_execution(
        &self,
        id: ExecutionId,
    ) -> Result<Option<TestExecution>, StoreError> {
        let mut tables = self.lock()?;
        let Some(row) = tables.executions.remove(&id) else {
            return Ok(None);
        };
        let mut exec = base_execution(&row);
        exec.tags = tables.tags.remove(&id).unwrap_or_default();
        exec.parameters = tables.parameters.remove(&id).unwrap_or_default();
        exec.values = tables.values.remove(&id).unwrap_or_default();
        Ok(Some(exec))
    }

    pub fn execution_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.executions.len())
    }

    // ----------------------------
    // Reports
    // ----------------------------

    pub fn insert_report(&self, record: NewReportRecord) -> Result<Report, StoreError> {
        let mut tables = self.lock()?;
        tables.last_report_id += 1;
        let id = ReportId(tables.last_report_id);
        let report = Report {
            id,
            name: record.name,
            report_type: record.report_type,
            username: record.username,
            properties: record.properties,
            permissions: record.permissions,
        };
        tables.reports.insert(id, report.clone());
        Ok(report)
    }

    pub fn report(&self, id: ReportId) -> Result<Option<Report>, StoreError> {
        Ok(self.lock()?.reports.get(&id).cloned())
    }

    /// Replaces an existing report wholesale. Properties are written as a
    /// unit, never patched key by key.
    pub fn update_report(&self, report: Report) -> Result<Report, StoreError> {
        let mut tables = self.lock()?;
        if !tables.reports.contains_key(&report.id) {
            return Err(StoreError::MissingReport { id: report.id.0 });
        }
        tables.reports.insert(report.id, report.clone());
        Ok(report)
    }

    pub fn remove_report(&self, id: ReportId) -> Result<Option<Report>, StoreError> {
        Ok(self.lock()?.reports.remove(&id))
    }

    pub fn reports(&self) -> Result<Vec<Report>, StoreError> {
        Ok(self.lock()?.reports.values().cloned().collect())
    }

    // ----------------------------
    // Snapshot
    // ----------------------------

    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let tables = self.lock()?;
        let executions = tables
            .executions
            .values()
            .map(|row| hydrated_execution(&tables, row))
            .collect();
        Ok(Snapshot {
            schema: SNAPSHOT_SCHEMA_V1.to_string(),
            tests: tables.tests.values().cloned().collect(),
            executions,
            reports: tables.reports.values().cloned().collect(),
        })
    }

    /// Rebuilds a repository from a snapshot document: indexes are derived
    /// from the rows, `test_uid` is re-denormalized from the test table,
    /// and id counters resume past the highest loaded id.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Repository, StoreError> {
        if snapshot.schema != SNAPSHOT_SCHEMA_V1 {
            return Err(StoreError::UnsupportedSchema {
                found: snapshot.schema,
            });
        }
        let mut tables = Tables::default();
        for test in snapshot.tests {
            if tables.tests_by_uid.contains_key(&test.uid) {
                return Err(StoreError::DuplicateTestUid { uid: test.uid });
            }
            tables.tests_by_uid.insert(test.uid.clone(), test.id);
            tables.last_test_id = tables.last_test_id.max(test.id.0);
            tables.tests.insert(test.id, test);
        }
        for exec in snapshot.executions {
            let test_uid = tables
                .tests
                .get(&exec.test_id)
                .ok_or(StoreError::MissingTest { id: exec.test_id.0 })?
                .uid
                .clone();
            let row = ExecutionRow {
                id: exec.id,
                test_id: exec.test_id,
                test_uid,
                name: exec.name,
                started: exec.started,
                comment: exec.comment,
            };
            tables.last_execution_id = tables.last_execution_id.max(exec.id.0);
            tables.tags.insert(exec.id, exec.tags);
            tables.parameters.insert(exec.id, exec.parameters);
            tables.values.insert(exec.id, exec.values);
            tables.executions.insert(exec.id, row);
        }
        for report in snapshot.reports {
            tables.last_report_id = tables.last_report_id.max(report.id.0);
            tables.reports.insert(report.id, report);
        }
        Ok(Repository {
            inner: Arc::new(Mutex::new(tables)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfrepo_types::Direction;
    use time::macros::datetime;

    fn new_test(uid: &str) -> NewTest {
        NewTest {
            uid: uid.into(),
            name: format!("Test {uid}"),
            group: "perf".into(),
            description: None,
            metrics: vec![Metric {
                name: "throughput".into(),
                direction: Direction::Higher,
                description: None,
            }],
        }
    }

    fn new_execution(test_id: TestId, name: &str) -> NewExecutionRecord {
        NewExecutionRecord {
            test_id,
            name: name.into(),
            started: datetime!(2024-05-01 08:00:00 UTC),
            comment: None,
            tags: vec!["nightly".into()],
            parameters: vec![Parameter {
                name: "clients".into(),
                value: "16".into(),
            }],
            values: vec![MeasuredValue {
                metric: "throughput".into(),
                result: 1500.0,
                parameters: BTreeMap::new(),
            }],
        }
    }

    #[test]
    fn insert_allocates_sequential_ids() {
        let repo = Repository::new();
        let a = repo.insert_test(new_test("a")).unwrap();
        let b = repo.insert_test(new_test("b")).unwrap();
        assert_eq!(a.id, TestId(1));
        assert_eq!(b.id, TestId(2));
    }

    #[test]
    fn duplicate_uid_is_rejected() {
        let repo = Repository::new();
        repo.insert_test(new_test("a")).unwrap();
        let err = repo.insert_test(new_test("a")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTestUid { .. }));
    }

    #[test]
    fn lookup_by_uid_and_id_agree() {
        let repo = Repository::new();
        let test = repo.insert_test(new_test("echo")).unwrap();
        assert_eq!(repo.test(test.id).unwrap().unwrap().uid, "echo");
        assert_eq!(repo.test_by_uid("echo").unwrap().unwrap().id, test.id);
        assert!(repo.test_by_uid("nope").unwrap().is_none());
    }

    #[test]
    fn returned_entities_are_isolated_clones() {
        let repo = Repository::new();
        let mut test = repo.insert_test(new_test("echo")).unwrap();
        test.name = "mutated".into();
        test.metrics.clear();
        let stored = repo.test(test.id).unwrap().unwrap();
        assert_eq!(stored.name, "Test echo");
        assert_eq!(stored.metrics.len(), 1);
    }

    #[test]
    fn execution_base_fetch_has_no_collections() {
        let repo = Repository::new();
        let test = repo.insert_test(new_test("echo")).unwrap();
        let exec = repo.insert_execution(new_execution(test.id, "run 1")).unwrap();
        assert_eq!(exec.tags, vec!["nightly".to_string()]);

        let base = repo.execution(exec.id).unwrap().unwrap();
        assert!(base.tags.is_empty());
        assert!(base.parameters.is_empty());
        assert!(base.values.is_empty());
        assert_eq!(base.test_uid, "echo");

        assert_eq!(repo.execution_tags(exec.id).unwrap(), vec!["nightly".to_string()]);
        assert_eq!(repo.execution_parameters(exec.id).unwrap().len(), 1);
        assert_eq!(repo.execution_values(exec.id).unwrap().len(), 1);
    }

    #[test]
    fn missing_execution_side_tables_hydrate_empty() {
        let repo = Repository::new();
        assert!(repo.execution_tags(ExecutionId(99)).unwrap().is_empty());
        assert!(repo.execution_values(ExecutionId(99)).unwrap().is_empty());
    }

    #[test]
    fn removing_test_cascades_to_executions() {
        let repo = Repository::new();
        let test = repo.insert_test(new_test("echo")).unwrap();
        let exec = repo.insert_execution(new_execution(test.id, "run 1")).unwrap();
        assert_eq!(repo.execution_count().unwrap(), 1);

        repo.remove_test(test.id).unwrap().unwrap();
        assert_eq!(repo.execution_count().unwrap(), 0);
        assert!(repo.execution(exec.id).unwrap().is_none());
        assert!(repo.execution_tags(exec.id).unwrap().is_empty());
        // UID is free again
        repo.insert_test(new_test("echo")).unwrap();
    }

    #[test]
    fn remove_execution_returns_hydrated_row() {
        let repo = Repository::new();
        let test = repo.insert_test(new_test("echo")).unwrap();
        let exec = repo.insert_execution(new_execution(test.id, "run 1")).unwrap();
        let removed = repo.remove_execution(exec.id).unwrap().unwrap();
        assert_eq!(removed.values.len(), 1);
        assert!(repo.remove_execution(exec.id).unwrap().is_none());
    }

    #[test]
    fn report_update_requires_existing_row() {
        let repo = Repository::new();
        let report = repo
            .insert_report(NewReportRecord {
                name: "weekly".into(),
                report_type: "TestGroupReport".into(),
                username: "alice".into(),
                properties: BTreeMap::new(),
                permissions: vec![],
            })
            .unwrap();

        let mut updated = report.clone();
        updated.name = "weekly v2".into();
        repo.update_report(updated).unwrap();
        assert_eq!(repo.report(report.id).unwrap().unwrap().name, "weekly v2");

        let mut ghost = report.clone();
        ghost.id = ReportId(99);
        let err = repo.update_report(ghost).unwrap_err();
        assert!(matches!(err, StoreError::MissingReport { id: 99 }));
    }

    #[test]
    fn snapshot_round_trips_and_resumes_ids() {
        let repo = Repository::new();
        let test = repo.insert_test(new_test("echo")).unwrap();
        repo.insert_execution(new_execution(test.id, "run 1")).unwrap();
        repo.insert_report(NewReportRecord {
            name: "weekly".into(),
            report_type: "TestGroupReport".into(),
            username: "alice".into(),
            properties: BTreeMap::new(),
            permissions: vec![],
        })
        .unwrap();

        let snap = repo.snapshot().unwrap();
        assert_eq!(snap.schema, SNAPSHOT_SCHEMA_V1);
        assert_eq!(snap.executions.len(), 1);
        assert_eq!(snap.executions[0].values.len(), 1);

        let restored = Repository::from_snapshot(snap).unwrap();
        assert_eq!(restored.execution_count().unwrap(), 1);
        assert_eq!(restored.test_by_uid("echo").unwrap().unwrap().id, test.id);

        // new inserts continue past the loaded ids
        let next = restored.insert_test(new_test("echo2")).unwrap();
        assert_eq!(next.id, TestId(2));
    }

    #[test]
    fn snapshot_with_unknown_schema_is_rejected() {
        let mut snap = Snapshot::empty();
        snap.schema = "perfrepo.snapshot.v9".into();
        let err = Repository::from_snapshot(snap).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedSchema { .. }));
    }

    #[test]
    fn snapshot_execution_without_test_is_rejected() {
        let mut snap = Snapshot::empty();
        snap.executions.push(TestExecution {
            id: ExecutionId(1),
            test_id: TestId(7),
            test_uid: "ghost".into(),
            name: "run".into(),
            started: datetime!(2024-05-01 08:00:00 UTC),
            comment: None,
            tags: vec![],
            parameters: vec![],
            values: vec![],
        });
        let err = Repository::from_snapshot(snap).unwrap_err();
        assert!(matches!(err, StoreError::MissingTest { id: 7 }));
    }
}
