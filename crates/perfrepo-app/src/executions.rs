//! Execution intake, lookup, and search.

use crate::Clock;
use perfrepo_error::{Error, SecurityError, ServiceError, StoreError};
use perfrepo_store::{ExecutionSearchCriteria, LastWindow, NewExecutionRecord, Repository};
use perfrepo_types::{
    DataPoint, ExecutionId, NewExecution, SessionContext, Test, TestExecution,
};
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeSet;

/// An execution together with the test it ran against.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExecutionDetail {
    pub execution: TestExecution,
    pub test: Test,
}

pub struct ExecutionService<C: Clock> {
    repo: Repository,
    clock: C,
}

impl<C: Clock> ExecutionService<C> {
    pub fn new(repo: Repository, clock: C) -> ExecutionService<C> {
        ExecutionService { repo, clock }
    }

    /// Record an execution. Every measured value must name a metric the
    /// test declares; a missing start time gets the current instant and
    /// repeated tags collapse to their first occurrence.
    pub fn create_execution(
        &self,
        session: &SessionContext,
        new: NewExecution,
    ) -> Result<TestExecution, Error> {
        let test = self.require_test(&new.test_uid)?;
        self.require_membership(session, &test)?;
        for value in &new.values {
            if test.metric(&value.metric).is_none() {
                return Err(ServiceError::UnknownMetricOnTest {
                    test_uid: test.uid.clone(),
                    metric: value.metric.clone(),
                }
                .into());
            }
        }
        let started = new.started.unwrap_or_else(|| self.clock.now());
        let mut seen = BTreeSet::new();
        let mut tags = new.tags;
        tags.retain(|t| seen.insert(t.clone()));
        Ok(self.repo.insert_execution(NewExecutionRecord {
            test_id: test.id,
            name: new.name,
            started,
            comment: new.comment,
            tags,
            parameters: new.parameters,
            values: new.values,
        })?)
    }

    pub fn get_execution(&self, id: ExecutionId) -> Result<Option<ExecutionDetail>, Error> {
        let Some(mut execution) = self.repo.execution(id)? else {
            return Ok(None);
        };
        execution.parameters = self.repo.execution_parameters(id)?;
        execution.tags = self.repo.execution_tags(id)?;
        execution.values = self.repo.execution_values(id)?;
        let test = self
            .repo
            .test(execution.test_id)?
            .ok_or(StoreError::MissingTest {
                id: execution.test_id.0,
            })?;
        Ok(Some(ExecutionDetail { execution, test }))
    }

    pub fn delete_execution(
        &self,
        session: &SessionContext,
        id: ExecutionId,
    ) -> Result<TestExecution, Error> {
        let execution = self
            .repo
            .execution(id)?
            .ok_or(ServiceError::UnknownExecution { id: id.0 })?;
        let test = self
            .repo
            .test(execution.test_id)?
            .ok_or(StoreError::MissingTest {
                id: execution.test_id.0,
            })?;
        self.require_membership(session, &test)?;
        Ok(self
            .repo
            .remove_execution(id)?
            .ok_or(StoreError::MissingExecution { id: id.0 })?)
    }

    pub fn list_for_test(&self, test_uid: &str) -> Result<Vec<TestExecution>, Error> {
        let test = self.require_test(test_uid)?;
        Ok(self.repo.executions_for_test(test.id)?)
    }

    pub fn search(
        &self,
        criteria: &ExecutionSearchCriteria,
        session: &SessionContext,
    ) -> Result<Vec<TestExecution>, Error> {
        Ok(self.repo.search(criteria, session)?)
    }

    pub fn search_last(
        &self,
        criteria: &ExecutionSearchCriteria,
        window: LastWindow,
        session: &SessionContext,
    ) -> Result<Vec<TestExecution>, Error> {
        Ok(self.repo.search_last(criteria, window, session)?)
    }

    /// Newest-first history of one declared metric, optionally narrowed to
    /// executions carrying all of `tags`.
    pub fn metric_history(
        &self,
        test_uid: &str,
        metric: &str,
        tags: &[String],
        limit: usize,
    ) -> Result<Vec<DataPoint>, Error> {
        let test = self.require_test(test_uid)?;
        if test.metric(metric).is_none() {
            return Err(ServiceError::UnknownMetricOnTest {
                test_uid: test.uid,
                metric: metric.to_string(),
            }
            .into());
        }
        Ok(self.repo.metric_history(test.id, metric, tags, limit)?)
    }

    pub fn value_for_metric(
        &self,
        id: ExecutionId,
        metric: &str,
    ) -> Result<Option<f64>, Error> {
        Ok(self.repo.value_for_metric(id, metric)?)
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
