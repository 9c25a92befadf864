//! Unified error types for perfrepo.
//!
//! Errors come in three classes with different blast radius:
//! business rule violations ([`ServiceError`]), authorization failures
//! ([`SecurityError`]), and repository backend faults ([`StoreError`]).
//! Lookups for entities that may legitimately be absent return `Option`
//! instead of an error; only mutations referencing a missing entity fail.

use thiserror::Error;

/// Business rule violations. These are caller mistakes, not tool faults.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("test with UID `{uid}` already exists")]
    DuplicateTestUid { uid: String },

    #[error("metric `{metric}` already exists on test `{test_uid}`")]
    DuplicateMetric { test_uid: String, metric: String },

    #[error("test `{uid}` does not exist")]
    UnknownTest { uid: String },

    #[error("test execution {id} does not exist")]
    UnknownExecution { id: u64 },

    #[error("metric `{metric}` is not defined on test `{test_uid}`")]
    UnknownMetricOnTest { test_uid: String, metric: String },

    #[error("report {id} does not exist")]
    UnknownReport { id: u64 },
}

/// Authorization failures. Kept apart from [`ServiceError`] so callers can
/// report them differently (the CLI uses a dedicated exit code).
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("user `{username}` is not a member of group `{group}`")]
    GroupNotAllowed { group: String, username: String },

    #[error("user `{username}` may not read report {id}")]
    ReadDenied { id: u64, username: String },

    #[error("user `{username}` may not modify report {id}")]
    WriteDenied { id: u64, username: String },
}

/// Repository backend faults. A well-behaved caller never sees these.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("repository lock poisoned by a panicked thread")]
    Poisoned,

    #[error("test {id} not found in store")]
    MissingTest { id: u64 },

    #[error("test execution {id} not found in store")]
    MissingExecution { id: u64 },

    #[error("report {id} not found in store")]
    MissingReport { id: u64 },

    #[error("test UID `{uid}` already present in store")]
    DuplicateTestUid { uid: String },

    #[error("unsupported snapshot schema `{found}`")]
    UnsupportedSchema { found: String },

    #[error("search pattern `{pattern}` cannot be compiled")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Umbrella error for service entry points.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// True for errors caused by the request rather than the tool.
    pub fn is_caller_fault(&self) -> bool {
        matches!(self, Error::Service(_) | Error::Security(_))
    }
}
