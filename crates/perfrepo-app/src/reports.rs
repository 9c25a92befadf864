//! Stored reports, their permissions, and the group report use case.

use perfrepo_error::{Error, SecurityError, ServiceError, StoreError};
use perfrepo_report::{
    DEFAULT_COMPARISON_THRESHOLD, MetricDirections, ReportConfig, ReportEditSession,
    ThresholdColor, compare, pivot, try_compare,
};
use perfrepo_store::{NewReportRecord, Repository};
use perfrepo_types::{
    AccessLevel, AccessType, Permission, Report, ReportId, SessionContext, Test,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ----------------------------
// Permissions
// ----------------------------

fn allows(permission: &Permission, session: &SessionContext) -> bool {
    match permission.level {
        AccessLevel::User => permission.user.as_deref() == Some(session.username.as_str()),
        AccessLevel::Group => permission
            .group
            .as_ref()
            .is_some_and(|g| session.is_member(g)),
        AccessLevel::Public => true,
    }
}

/// The owner can always read; otherwise any matching permission grants
/// read access, write permissions included.
fn can_read(report: &Report, session: &SessionContext) -> bool {
    report.username == session.username || report.permissions.iter().any(|p| allows(p, session))
}

fn can_write(report: &Report, session: &SessionContext) -> bool {
    report.username == session.username
        || report
            .permissions
            .iter()
            .any(|p| p.access_type == AccessType::Write && allows(p, session))
}

#[derive(Debug, Clone)]
pub struct ReportService {
    repo: Repository,
}

impl ReportService {
    pub fn new(repo: Repository) -> ReportService {
        ReportService { repo }
    }

    pub fn create_report(
        &self,
        session: &SessionContext,
        name: &str,
        report_type: &str,
        properties: BTreeMap<String, String>,
        permissions: Vec<Permission>,
    ) -> Result<Report, Error> {
        Ok(self.repo.insert_report(NewReportRecord {
            name: name.to_string(),
            report_type: report_type.to_string(),
            username: session.username.clone(),
            properties,
            permissions,
        })?)
    }

    /// `Ok(None)` when no such report exists; a denial for a report that
    /// does exist is an error, not absence.
    pub fn get_report(
        &self,
        session: &SessionContext,
        id: ReportId,
    ) -> Result<Option<Report>, Error> {
        match self.repo.report(id)? {
            None => Ok(None),
            Some(report) if !can_read(&report, session) => Err(SecurityError::ReadDenied {
                id: id.0,
                username: session.username.clone(),
            }
            .into()),
            Some(report) => Ok(Some(report)),
        }
    }

    /// Replace name, properties, and permissions. The owner recorded at
    /// creation time stays.
    pub fn update_report(&self, session: &SessionContext, report: Report) -> Result<Report, Error> {
        let existing = self
            .repo
            .report(report.id)?
            .ok_or(ServiceError::UnknownReport { id: report.id.0 })?;
        if !can_write(&existing, session) {
            return Err(SecurityError::WriteDenied {
                id: report.id.0,
                username: session.username.clone(),
            }
            .into());
        }
        let mut updated = report;
        updated.username = existing.username;
        Ok(self.repo.update_report(updated)?)
    }

    pub fn delete_report(&self, session: &SessionContext, id: ReportId) -> Result<Report, Error> {
        let existing = self
            .repo
            .report(id)?
            .ok_or(ServiceError::UnknownReport { id: id.0 })?;
        if !can_write(&existing, session) {
            return Err(SecurityError::WriteDenied {
                id: id.0,
                username: session.username.clone(),
            }
            .into());
        }
        Ok(self
            .repo
            .remove_report(id)?
            .ok_or(StoreError::MissingReport { id: id.0 })?)
    }

    pub fn list_reports(&self, session: &SessionContext) -> Result<Vec<Report>, Error> {
        let mut reports = self.repo.reports()?;
        reports.retain(|r| can_read(r, session));
        Ok(reports)
    }
}

// ----------------------------
// Group report use case
// ----------------------------

/// One cell of the rendered matrix.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct MatrixRow {
    pub test_uid: String,
    pub column: String,
    pub metric: String,
    pub samples: Vec<f64>,
    pub best: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ComparisonRow {
    pub test_uid: String,
    pub label: String,
    pub metric: String,
    pub left: Option<f64>,
    pub right: Option<f64>,
    pub delta: Option<f64>,
    pub color: ThresholdColor,
}

/// Fully evaluated group report, ready to serialize or render.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct GroupReportView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ReportId>,
    pub name: String,
    pub threshold: f64,
    pub config: ReportConfig,
    pub columns: Vec<String>,
    pub metrics: Vec<String>,
    pub rows: Vec<MatrixRow>,
    pub comparisons: Vec<ComparisonRow>,
}

pub struct GroupReportUseCase {
    repo: Repository,
    reports: ReportService,
    threshold: f64,
}

impl GroupReportUseCase {
    pub fn new(repo: Repository) -> GroupReportUseCase {
        GroupReportUseCase {
            reports: ReportService::new(repo.clone()),
            repo,
            threshold: DEFAULT_COMPARISON_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> GroupReportUseCase {
        self.threshold = threshold;
        self
    }

    /// Evaluate a configuration against the current store contents.
    ///
    /// Executions are fetched once per tag column (an execution matching
    /// several columns is loaded once), pivoted, and compared.
    pub fn build(&self, config: &ReportConfig) -> Result<GroupReportView, Error> {
        let mut executions = Vec::new();
        let mut seen = BTreeSet::new();
        for selector in &config.tags {
            let tags: Vec<String> = selector
                .label
                .split_whitespace()
                .map(|t| t.to_string())
                .collect();
            for execution in self.repo.executions_for_report(&tags, &config.tests, None)? {
                if seen.insert(execution.id) {
                    executions.push(execution);
                }
            }
        }
        executions.sort_by(|a, b| (a.started, a.id).cmp(&(b.started, b.id)));

        let mut tests: Vec<Test> = Vec::new();
        for uid in &config.tests {
            if let Some(test) = self.repo.test_by_uid(uid)? {
                tests.push(test);
            }
        }
        let directions = MetricDirections::from_tests(&tests);
        let table = pivot(&executions, config, &directions);

        let metrics = if config.metrics.is_empty() {
            table.metrics.clone()
        } else {
            config.metrics.clone()
        };
        let mut columns: Vec<String> = config
            .tags
            .iter()
            .map(|s| s.display_label().to_string())
            .collect();
        columns.extend(table.discovered_tags.iter().cloned());

        let row_uids: Vec<String> = if config.tests.is_empty() {
            table.rows.keys().cloned().collect()
        } else {
            config.tests.clone()
        };

        let mut rows = Vec::new();
        for uid in &row_uids {
            for column in &columns {
                for metric in &metrics {
                    let cell = table.cell(uid, column, metric);
                    rows.push(MatrixRow {
                        test_uid: uid.clone(),
                        column: column.clone(),
                        metric: metric.clone(),
                        samples: cell
                            .map(|c| c.values().iter().map(|v| v.result).collect())
                            .unwrap_or_default(),
                        best: cell.and_then(|c| c.best()).map(|v| v.result),
                    });
                }
            }
        }

        let mut comparisons = Vec::new();
        for uid in &row_uids {
            for def in &config.comparisons {
                for metric in &metrics {
                    let delta = try_compare(&table, uid, &def.left, &def.right, metric);
                    let color = ThresholdColor::classify(
                        compare(&table, uid, &def.left, &def.right, metric),
                        self.threshold,
                    );
                    comparisons.push(ComparisonRow {
                        test_uid: uid.clone(),
                        label: def.label(),
                        metric: metric.clone(),
                        left: table
                            .cell(uid, &def.left, metric)
                            .and_then(|c| c.best())
                            .map(|v| v.result),
                        right: table
                            .cell(uid, &def.right, metric)
                            .and_then(|c| c.best())
                            .map(|v| v.result),
                        delta,
                        color,
                    });
                }
            }
        }

        Ok(GroupReportView {
            id: None,
            name: String::new(),
            threshold: self.threshold,
            config: config.clone(),
            columns,
            metrics,
            rows,
            comparisons,
        })
    }

    /// Load a stored report, decode its configuration, and evaluate it.
    pub fn load(&self, session: &SessionContext, id: ReportId) -> Result<GroupReportView, Error> {
        let report = self
            .reports
            .get_report(session, id)?
            .ok_or(ServiceError::UnknownReport { id: id.0 })?;
        let config = ReportConfig::decode(&report.properties);
        let mut view = self.build(&config)?;
        view.id = Some(report.id);
        view.name = report.name;
        Ok(view)
    }

    /// Persist a configuration, either as a fresh report or over an
    /// existing one.
    pub fn save(
        &self,
        session: &SessionContext,
        name: &str,
        config: &ReportConfig,
        permissions: Vec<Permission>,
        existing: Option<ReportId>,
    ) -> Result<Report, Error> {
        let properties = config.encode();
        match existing {
            None => self.reports.create_report(
                session,
                name,
                perfrepo_report::REPORT_TYPE_TEST_GROUP,
                properties,
                permissions,
            ),
            Some(id) => {
                let stored = self
                    .reports
                    .get_report(session, id)?
                    .ok_or(ServiceError::UnknownReport { id: id.0 })?;
                self.reports.update_report(
                    session,
                    Report {
                        id,
                        name: name.to_string(),
                        report_type: stored.report_type,
                        username: stored.username,
                        properties,
                        permissions,
                    },
                )
            }
        }
    }
}

// ----------------------------
// Interactive configuration editing
// ----------------------------

/// Edit session bound to the store, so test UIDs get validated as they are
/// added.
pub struct GroupReportEditor {
    repo: Repository,
    session: ReportEditSession,
}

impl GroupReportEditor {
    pub fn begin(repo: Repository, config: ReportConfig) -> GroupReportEditor {
        GroupReportEditor {
            repo,
            session: ReportEditSession::begin(config),
        }
    }

    pub fn working(&self) -> &ReportConfig {
        self.session.working()
    }

    pub fn add_test(&mut self, uid: &str) -> Result<bool, Error> {
        if self.repo.test_by_uid(uid)?.is_none() {
            return Err(ServiceError::UnknownTest {
                uid: uid.to_string(),
            }
            .into());
        }
        Ok(self.session.add_test(uid))
    }

    pub fn remove_test(&mut self, uid: &str) {
        self.session.remove_test(uid);
    }

    pub fn add_tags(&mut self, raw: &str) -> Option<String> {
        self.session.add_tags(raw)
    }

    pub fn remove_tags(&mut self, label: &str) {
        self.session.remove_tags(label);
    }

    pub fn set_tag_alias(&mut self, label: &str, alias: Option<String>) -> bool {
        self.session.set_tag_alias(label, alias)
    }

    pub fn add_comparison(&mut self, left: &str, right: &str) -> bool {
        self.session.add_comparison(left, right)
    }

    pub fn remove_comparison(&mut self, label: &str) {
        self.session.remove_comparison(label);
    }

    pub fn set_metrics(&mut self, metrics: Vec<String>) {
        self.session.set_metrics(metrics);
    }

    pub fn commit(self) -> ReportConfig {
        self.session.commit()
    }

    pub fn discard(self) -> ReportConfig {
        self.session.discard()
    }
}
