//! Staged edits to a report configuration.
//!
//! A session snapshots the configuration it started from, applies edits to a
//! working copy, and reconciles on commit: when a tag column's alias changed,
//! every comparison slot naming the old alias is rewritten to the new one so
//! stored comparisons keep pointing at the same column.

use crate::config::{ComparisonDef, ReportConfig, TagSelector};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct ReportEditSession {
    original: ReportConfig,
    working: ReportConfig,
}

impl ReportEditSession {
    pub fn begin(config: ReportConfig) -> ReportEditSession {
        ReportEditSession {
            original: config.clone(),
            working: config,
        }
    }

    pub fn working(&self) -> &ReportConfig {
        &self.working
    }

    pub fn add_test(&mut self, uid: &str) -> bool {
        if self.working.tests.iter().any(|t| t == uid) {
            return false;
        }
        self.working.tests.push(uid.to_string());
        true
    }

    pub fn remove_test(&mut self, uid: &str) {
        self.working.tests.retain(|t| t != uid);
    }

    /// Add a tag column from raw user input. The tokens are deduplicated and
    /// sorted into the canonical label; returns the label, or `None` when
    /// the input is blank or the column already exists.
    pub fn add_tags(&mut self, raw: &str) -> Option<String> {
        let mut tokens: Vec<String> = raw.split_whitespace().map(|t| t.to_string()).collect();
        tokens.sort();
        tokens.dedup();
        if tokens.is_empty() {
            return None;
        }
        let label = tokens.join(" ");
        if self.working.tags.iter().any(|s| s.label == label) {
            return None;
        }
        self.working.tags.push(TagSelector {
            label: label.clone(),
            alias: None,
        });
        Some(label)
    }

    pub fn remove_tags(&mut self, label: &str) {
        self.working.tags.retain(|s| s.label != label);
    }

    pub fn set_tag_alias(&mut self, label: &str, alias: Option<String>) -> bool {
        match self.working.tags.iter_mut().find(|s| s.label == label) {
            Some(selector) => {
                selector.alias = alias;
                true
            }
            None => false,
        }
    }

    /// Add a comparison between two display labels, pre-named
    /// `"<right> vs. <left>"`. An already-present pair is rejected.
    pub fn add_comparison(&mut self, left: &str, right: &str) -> bool {
        if self.working.has_comparison(left, right) {
            return false;
        }
        self.working.comparisons.push(ComparisonDef {
            left: left.to_string(),
            right: right.to_string(),
            alias: Some(format!("{right} vs. {left}")),
        });
        true
    }

    pub fn remove_comparison(&mut self, label: &str) {
        self.working.comparisons.retain(|c| c.label() != label);
    }

    pub fn set_metrics(&mut self, metrics: Vec<String>) {
        let mut seen = BTreeSet::new();
        self.working.metrics = metrics
            .into_iter()
            .filter(|m| seen.insert(m.clone()))
            .collect();
    }

    /// Finish the session: rewrite comparison slots for every alias rename,
    /// then hand back the edited configuration.
    pub fn commit(self) -> ReportConfig {
        let mut config = self.working;
        let renames: Vec<(String, String)> = config
            .tags
            .iter()
            .filter_map(|selector| {
                let before = self
                    .original
                    .tags
                    .iter()
                    .find(|s| s.label == selector.label)?;
                match (&before.alias, &selector.alias) {
                    (Some(old), Some(new)) if old != new => Some((old.clone(), new.clone())),
                    _ => None,
                }
            })
            .collect();
        for (old, new) in &renames {
            for comparison in &mut config.comparisons {
                if comparison.left == *old {
                    comparison.left = new.clone();
                }
                if comparison.right == *old {
                    comparison.right = new.clone();
                }
            }
        }
        config
    }

    pub fn discard(self) -> ReportConfig {
        self.original
    }
}
