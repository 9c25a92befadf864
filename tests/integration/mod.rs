//! Workspace-level integration tests: whole flows driven through the
//! `perfrepo` facade crate.

mod report_flow;
mod search_flow;
