//! Shared types for perfrepo.
//!
//! Design goal: versioned, explicit, boring.
//! These structs are the contract between the store, the report engine,
//! the services, and the CLI; the snapshot document is what lands on disk.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use time::OffsetDateTime;

pub const SNAPSHOT_SCHEMA_V1: &str = "perfrepo.snapshot.v1";

// ----------------------------
// Identifiers
// ----------------------------

#[derive(
    Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct TestId(pub u64);

#[derive(
    Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct ExecutionId(pub u64);

#[derive(
    Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct ReportId(pub u64);

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ----------------------------
// Tests and metrics
// ----------------------------

/// Which way a metric improves.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Higher,
    Lower,
}

impl Direction {
    /// True when `candidate` is strictly better than `incumbent`.
    /// Ties are not preferred, so the first-seen value wins them.
    pub fn prefers(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Direction::Higher => candidate > incumbent,
            Direction::Lower => candidate < incumbent,
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown direction `{0}` (expected `higher` or `lower`)")]
pub struct ParseDirectionError(String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "higher" => Ok(Direction::Higher),
            "lower" => Ok(Direction::Lower),
            other => Err(ParseDirectionError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Metric {
    pub name: String,
    pub direction: Direction,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A test definition. Owned by a group; metrics are owned values and their
/// names are unique within one test.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Test {
    pub id: TestId,

    /// Human-readable unique identifier, the handle reports reference.
    pub uid: String,

    pub name: String,
    pub group: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub metrics: Vec<Metric>,
}

impl Test {
    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn direction_of(&self, metric: &str) -> Option<Direction> {
        self.metric(metric).map(|m| m.direction)
    }
}

// ----------------------------
// Test executions
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

/// One measured result for one metric of an execution.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct MeasuredValue {
    pub metric: String,
    pub result: f64,

    /// Sub-parameters distinguishing multiple values of the same metric
    /// (percentile labels, client counts, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

/// One run of a test. `test_uid` is denormalized from the owning test at
/// insert time so report configs can reference executions without a join.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TestExecution {
    pub id: ExecutionId,
    pub test_id: TestId,
    pub test_uid: String,

    pub name: String,

    #[serde(with = "time::serde::rfc3339")]
    #[schemars(with = "String")]
    pub started: OffsetDateTime,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Label set; original case is preserved, matching is case-insensitive
    /// on the criteria search path.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<MeasuredValue>,
}

/// One point of a metric history query.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct DataPoint {
    pub execution_id: ExecutionId,

    #[serde(with = "time::serde::rfc3339")]
    #[schemars(with = "String")]
    pub started: OffsetDateTime,

    pub value: f64,
}

// ----------------------------
// Reports and permissions
// ----------------------------

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Read,
    Write,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    User,
    Group,
    Public,
}

/// Grants `access_type` at `level`. `user` is set for user-level grants,
/// `group` for group-level ones; public grants carry neither.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Permission {
    pub access_type: AccessType,
    pub level: AccessLevel,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// A stored report: named, user-owned, typed, configured through a flat
/// string-to-string property map written as a whole on save.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Report {
    pub id: ReportId,
    pub name: String,

    #[serde(rename = "type")]
    pub report_type: String,

    /// Owning user; always has read and write access.
    pub username: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<Permission>,
}

// ----------------------------
// Caller identity
// ----------------------------

/// Caller identity injected by the (external) authorization layer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SessionContext {
    pub username: String,

    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl SessionContext {
    pub fn new<U, G, I>(username: U, groups: I) -> Self
    where
        U: Into<String>,
        G: Into<String>,
        I: IntoIterator<Item = G>,
    {
        SessionContext {
            username: username.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_member(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

/// Which tests a query may see.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupFilter {
    #[default]
    AllGroups,
    MyGroups,
}

// ----------------------------
// Mutation inputs
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct NewTest {
    pub uid: String,
    pub name: String,
    pub group: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct NewExecution {
    pub test_uid: String,
    pub name: String,

    /// Defaults to the service clock when absent.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<String>")]
    pub started: Option<OffsetDateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<MeasuredValue>,
}

// ----------------------------
// Snapshot document
// ----------------------------

/// The whole repository state as one versioned document. Executions are
/// fully hydrated; the store rebuilds its indexes on load.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Snapshot {
    pub schema: String,
    pub tests: Vec<Test>,
    pub executions: Vec<TestExecution>,
    pub reports: Vec<Report>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Snapshot {
            schema: SNAPSHOT_SCHEMA_V1.to_string(),
            tests: Vec::new(),
            executions: Vec::new(),
            reports: Vec::new(),
        }
    }
}

// ----------------------------
// Optional config file schema
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct DefaultsConfig {
    /// Path of the repository snapshot file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    /// Percentage below which a comparison delta turns red.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison_threshold: Option<f64>,
}
