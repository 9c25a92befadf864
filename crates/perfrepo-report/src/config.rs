//! Report configuration and its flat persisted form.
//!
//! A stored report carries its whole configuration as one flat string map.
//! List entries use 1-based dotted keys (`tag.1`, `compare.2.alias`);
//! decoding scans each list upward until the first missing index and ignores
//! keys it does not understand, so documents written by other frontends stay
//! loadable.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const REPORT_TYPE_TEST_GROUP: &str = "TestGroupReport";

/// One tag column of the report: the normalized tag label plus an optional
/// display alias.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct TagSelector {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl TagSelector {
    pub fn display_label(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.label)
    }
}

/// Comparison between two tag columns, both named by display label.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ComparisonDef {
    pub left: String,
    pub right: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl ComparisonDef {
    pub fn label(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => format!("{} vs. {}", self.right, self.left),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ReportConfig {
    pub tests: Vec<String>,
    pub tags: Vec<TagSelector>,
    pub comparisons: Vec<ComparisonDef>,
    pub metrics: Vec<String>,
}

impl ReportConfig {
    /// Display alias configured for a normalized tag label, if any.
    pub fn tag_alias(&self, label: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|s| s.label == label)
            .and_then(|s| s.alias.as_deref())
    }

    pub fn has_comparison(&self, left: &str, right: &str) -> bool {
        self.comparisons
            .iter()
            .any(|c| c.left == left && c.right == right)
    }

    pub fn encode(&self) -> BTreeMap<String, String> {
        let mut properties = BTreeMap::new();
        if !self.tests.is_empty() {
            properties.insert("tests".to_string(), self.tests.join(", "));
        }
        for (i, selector) in self.tags.iter().enumerate() {
            let n = i + 1;
            properties.insert(format!("tag.{n}"), selector.label.clone());
            if let Some(alias) = &selector.alias {
                properties.insert(format!("tag.{n}.alias"), alias.clone());
            }
        }
        for (i, comparison) in self.comparisons.iter().enumerate() {
            let n = i + 1;
            properties.insert(format!("compare.{n}.1"), comparison.left.clone());
            properties.insert(format!("compare.{n}.2"), comparison.right.clone());
            if let Some(alias) = &comparison.alias {
                properties.insert(format!("compare.{n}.alias"), alias.clone());
            }
        }
        if !self.metrics.is_empty() {
            properties.insert("metrics".to_string(), self.metrics.join(", "));
        }
        properties
    }

    pub fn decode(properties: &BTreeMap<String, String>) -> ReportConfig {
        let mut config = ReportConfig {
            tests: split_list(properties.get("tests")),
            ..Default::default()
        };
        for n in 1.. {
            let Some(label) = properties.get(&format!("tag.{n}")) else {
                break;
            };
            config.tags.push(TagSelector {
                label: label.clone(),
                alias: properties.get(&format!("tag.{n}.alias")).cloned(),
            });
        }
        for n in 1.. {
            let Some(left) = properties.get(&format!("compare.{n}.1")) else {
                break;
            };
            config.comparisons.push(ComparisonDef {
                left: left.clone(),
                right: properties
                    .get(&format!("compare.{n}.2"))
                    .cloned()
                    .unwrap_or_default(),
                alias: properties.get(&format!("compare.{n}.alias")).cloned(),
            });
        }
        config.metrics = split_list(properties.get("metrics"));
        config
    }
}

fn split_list(joined: Option<&String>) -> Vec<String> {
    joined
        .map(|s| {
            s.split(", ")
                .filter(|token| !token.is_empty())
                .map(|token| token.to_string())
                .collect()
        })
        .unwrap_or_default()
}
