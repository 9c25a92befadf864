//! Test catalog: tests and the metrics measured against them.

use perfrepo_error::{Error, SecurityError, ServiceError, StoreError};
use perfrepo_store::Repository;
use perfrepo_types::{GroupFilter, Metric, NewTest, SessionContext, Test, TestId};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct TestService {
    repo: Repository,
}

impl TestService {
    pub fn new(repo: Repository) -> TestService {
        TestService { repo }
    }

    /// Create a test in one of the caller's groups. The UID must be free
    /// and the metric names inside the definition distinct.
    pub fn create_test(&self, session: &SessionContext, new: NewTest) -> Result<Test, Error> {
        if !session.is_member(&new.group) {
            return Err(SecurityError::GroupNotAllowed {
                group: new.group.clone(),
                username: session.username.clone(),
            }
            .into());
        }
        if self.repo.test_by_uid(&new.uid)?.is_some() {
            return Err(ServiceError::DuplicateTestUid {
                uid: new.uid.clone(),
            }
            .into());
        }
        let mut seen = BTreeSet::new();
        for metric in &new.metrics {
            if !seen.insert(metric.name.as_str()) {
                return Err(ServiceError::DuplicateMetric {
                    test_uid: new.uid.clone(),
                    metric: metric.name.clone(),
                }
                .into());
            }
        }
        Ok(self.repo.insert_test(new)?)
    }

    pub fn get_test(&self, id: TestId) -> Result<Option<Test>, Error> {
        Ok(self.repo.test(id)?)
    }

    pub fn get_test_by_uid(&self, uid: &str) -> Result<Option<Test>, Error> {
        Ok(self.repo.test_by_uid(uid)?)
    }

    pub fn list_tests(
        &self,
        session: &SessionContext,
        filter: GroupFilter,
    ) -> Result<Vec<Test>, Error> {
        let mut tests = self.repo.tests()?;
        if filter == GroupFilter::MyGroups {
            tests.retain(|t| session.is_member(&t.group));
        }
        Ok(tests)
    }

    pub fn add_metric(
        &self,
        session: &SessionContext,
        test_uid: &str,
        metric: Metric,
    ) -> Result<Test, Error> {
        let test = self.require_test(test_uid)?;
        self.require_membership(session, &test)?;
        if test.metric(&metric.name).is_some() {
            return Err(ServiceError::DuplicateMetric {
                test_uid: test.uid,
                metric: metric.name,
            }
            .into());
        }
        Ok(self.repo.add_metric(test.id, metric)?)
    }

    /// Delete the test and everything hanging off it: executions, their
    /// tags, parameters, and values.
    pub fn delete_test(&self, session: &SessionContext, uid: &str) -> Result<Test, Error> {
        let test = self.require_test(uid)?;
        self.require_membership(session, &test)?;
        Ok(self
            .repo
            .remove_test(test.id)?
            .ok_or(StoreError::MissingTest { id: test.id.0 })?)
    }

    fn require_test(&self, uid: &str) -> Result<Test, Error> {
        self.repo.test_by_uid(uid)?.ok_or_else(|| {
            ServiceError::UnknownTest {
                uid: uid.to_string(),
            }
            .into()
        })
    }

    fn require_membership(&self, session: &SessionContext, test: &Test) -> Result<(), Error> {
        if session.is_member(&test.group) {
            return Ok(());
        }
        Err(SecurityError::GroupNotAllowed {
            group: test.group.clone(),
            username: session.username.clone(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfrepo_types::Direction;

    fn session() -> SessionContext {
        SessionContext::new("alice", ["perf", "kernel"])
    }

    fn new_test(uid: &str, group: &str) -> NewTest {
        NewTest {
            uid: uid.into(),
            name: format!("{uid} test"),
            group: group.into(),
            description: None,
            metrics: vec![Metric {
                name: "throughput".into(),
                direction: Direction::Higher,
                description: None,
            }],
        }
    }

    #[test]
    fn create_assigns_ids_and_rejects_taken_uids() {
        let service = TestService::new(Repository::new());
        let created = service.create_test(&session(), new_test("echo", "perf")).unwrap();
        assert_eq!(created.id, TestId(1));

        let err = service
            .create_test(&session(), new_test("echo", "perf"))
            .unwrap_err();
        assert!(err.is_caller_fault());
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn create_requires_group_membership() {
        let service = TestService::new(Repository::new());
        let err = service
            .create_test(&session(), new_test("echo", "storage"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Security(SecurityError::GroupNotAllowed { .. })
        ));
    }

    #[test]
    fn create_rejects_repeated_metric_names() {
        let service = TestService::new(Repository::new());
        let mut new = new_test("echo", "perf");
        new.metrics.push(new.metrics[0].clone());
        let err = service.create_test(&session(), new).unwrap_err();
        assert!(matches!(
            err,
            Error::Service(ServiceError::DuplicateMetric { .. })
        ));
    }

    #[test]
    fn add_metric_guards_against_duplicates() {
        let service = TestService::new(Repository::new());
        service.create_test(&session(), new_test("echo", "perf")).unwrap();

        let latency = Metric {
            name: "latency".into(),
            direction: Direction::Lower,
            description: None,
        };
        let updated = service.add_metric(&session(), "echo", latency.clone()).unwrap();
        assert_eq!(updated.metrics.len(), 2);

        let err = service.add_metric(&session(), "echo", latency).unwrap_err();
        assert!(matches!(
            err,
            Error::Service(ServiceError::DuplicateMetric { .. })
        ));
    }

    #[test]
    fn list_can_restrict_to_session_groups() {
        let service = TestService::new(Repository::new());
        service.create_test(&session(), new_test("mine", "perf")).unwrap();
        let owner = SessionContext::new("bob", ["storage"]);
        service.create_test(&owner, new_test("theirs", "storage")).unwrap();

        let all = service.list_tests(&session(), GroupFilter::AllGroups).unwrap();
        assert_eq!(all.len(), 2);

        let mine = service.list_tests(&session(), GroupFilter::MyGroups).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].uid, "mine");
    }

    #[test]
    fn delete_refuses_foreign_groups_and_unknown_uids() {
        let service = TestService::new(Repository::new());
        let owner = SessionContext::new("bob", ["storage"]);
        service.create_test(&owner, new_test("theirs", "storage")).unwrap();

        let err = service.delete_test(&session(), "theirs").unwrap_err();
        assert!(matches!(err, Error::Security(_)));

        let err = service.delete_test(&session(), "ghost").unwrap_err();
        assert!(matches!(
            err,
            Error::Service(ServiceError::UnknownTest { .. })
        ));

        service.delete_test(&owner, "theirs").unwrap();
        assert!(service.get_test_by_uid("theirs").unwrap().is_none());
    }
}
