//! Perfrepo workspace-level test utilities.
//!
//! This crate exists solely to support the workspace-level integration
//! tests in `tests/integration/`.
//!
//! The actual perfrepo functionality is in the workspace member crates:
//! - `perfrepo-types`: shared structs and the snapshot document
//! - `perfrepo-store`: in-memory repository and criteria search
//! - `perfrepo-report`: pivoting and comparison math
//! - `perfrepo-app`: application services
//! - `perfrepo` (`perfrepo-cli`): facade library and CLI interface
