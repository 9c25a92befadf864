//! Execution search: dynamic multi-predicate queries over stored executions.
//!
//! Every active criterion becomes one [`Predicate`] value. A predicate
//! declares which joined data it needs (test row, tag list, parameter list);
//! the scan materializes only the joins the active set requires, and the
//! predicates combine conjunctively. No matches is an empty result, never an
//! error.

use crate::{ExecutionRow, Repository, Tables, base_execution, hydrated_execution};
use perfrepo_error::StoreError;
use perfrepo_types::{
    DataPoint, ExecutionId, GroupFilter, Parameter, SessionContext, Test, TestExecution, TestId,
};
use regex::Regex;
use std::collections::BTreeSet;
use time::OffsetDateTime;

/// One parameter criterion: some parameter named `name` must LIKE-match
/// `value` (`%` any run, `_` one character, case-sensitive). An empty or
/// missing value matches any value. `displayed` additionally requests the
/// parameter in the result rows.
#[derive(Debug, Clone, Default)]
pub struct ParamCriterion {
    pub name: String,
    pub value: Option<String>,
    pub displayed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionSearchCriteria {
    /// Inclusive lower bound on the started timestamp.
    pub started_from: Option<OffsetDateTime>,

    /// Inclusive upper bound.
    pub started_to: Option<OffsetDateTime>,

    /// Whitespace-separated tag tokens; a `-` prefix excludes the tag.
    pub tag_query: Option<String>,

    /// Test name filter: trailing `*` is a prefix wildcard, anything else
    /// must match exactly. Case-insensitive either way.
    pub test_name: Option<String>,

    /// Test UID filter with the same matching rules as `test_name`.
    pub test_uid: Option<String>,

    pub group_filter: GroupFilter,
    pub parameters: Vec<ParamCriterion>,
}

/// Window over the oldest-first hit list: `how_many` entries starting
/// `last_from` back from the newest end. A `last_from` beyond the list
/// clamps to the start.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LastWindow {
    pub last_from: usize,
    pub how_many: usize,
}

/// Parsed tag expression. The whole expression is lowercased before
/// splitting; bare `-` and empty tokens are dropped; duplicates collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagQuery {
    pub included: BTreeSet<String>,
    pub excluded: BTreeSet<String>,
}

impl TagQuery {
    pub fn parse(expression: &str) -> TagQuery {
        let mut query = TagQuery::default();
        for token in expression.to_lowercase().split_whitespace() {
            if let Some(stripped) = token.strip_prefix('-') {
                if !stripped.is_empty() {
                    query.excluded.insert(stripped.to_string());
                }
            } else {
                query.included.insert(token.to_string());
            }
        }
        query
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty() && self.excluded.is_empty()
    }
}

/// SQL LIKE pattern compiled to an anchored regex: `%` becomes `.*`, `_`
/// becomes `.`, everything else is escaped literally.
#[derive(Debug, Clone)]
pub struct LikePattern {
    regex: Regex,
}

impl LikePattern {
    pub fn new(pattern: &str, case_insensitive: bool) -> Result<LikePattern, StoreError> {
        let mut src = String::with_capacity(pattern.len() + 8);
        src.push_str(if case_insensitive { "(?si)" } else { "(?s)" });
        src.push('^');
        for c in pattern.chars() {
            match c {
                '%' => src.push_str(".*"),
                '_' => src.push('.'),
                c => {
                    let mut buf = [0u8; 4];
                    src.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                }
            }
        }
        src.push('$');
        let regex = Regex::new(&src).map_err(|source| StoreError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(LikePattern { regex })
    }

    pub fn matches(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }
}

/// Name/UID matching: trailing `*` turns the input into a LIKE prefix
/// pattern, anything else is folded equality.
#[derive(Debug, Clone)]
enum TextMatch {
    Exact(String),
    Like(LikePattern),
}

impl TextMatch {
    fn from_user(input: &str) -> Result<TextMatch, StoreError> {
        match input.strip_suffix('*') {
            Some(prefix) => {
                let mut pattern = String::from(prefix);
                pattern.push('%');
                Ok(TextMatch::Like(LikePattern::new(&pattern, true)?))
            }
            None => Ok(TextMatch::Exact(input.to_lowercase())),
        }
    }

    fn matches(&self, input: &str) -> bool {
        match self {
            TextMatch::Exact(want) => input.to_lowercase() == *want,
            TextMatch::Like(pattern) => pattern.matches(input),
        }
    }
}

/// Which side data a predicate needs materialized during the scan.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
struct Joins {
    test: bool,
    tags: bool,
    parameters: bool,
}

impl Joins {
    fn union(self, other: Joins) -> Joins {
        Joins {
            test: self.test || other.test,
            tags: self.tags || other.tags,
            parameters: self.parameters || other.parameters,
        }
    }
}

/// One execution row with exactly the joins the predicate set asked for.
struct ExecutionScan<'a> {
    row: &'a ExecutionRow,
    test: Option<&'a Test>,
    tags: Option<&'a [String]>,
    parameters: Option<&'a [Parameter]>,
}

enum Predicate {
    StartedFrom(OffsetDateTime),
    StartedTo(OffsetDateTime),
    /// Folded execution tag set must contain every token.
    HasAllTagsFolded(BTreeSet<String>),
    /// Folded execution tag set must contain none of the tokens.
    HasNoTagsFolded(BTreeSet<String>),
    TestName(TextMatch),
    TestUid(TextMatch),
    TestGroupIn(BTreeSet<String>),
    Parameter { name: String, pattern: LikePattern },
    /// Case-sensitive exact containment; the report fetch path.
    HasAllTagsExact(BTreeSet<String>),
    TestUidIn(BTreeSet<String>),
}

impl Predicate {
    fn joins(&self) -> Joins {
        match self {
            Predicate::StartedFrom(_) | Predicate::StartedTo(_) => Joins::default(),
            Predicate::HasAllTagsFolded(_)
            | Predicate::HasNoTagsFolded(_)
            | Predicate::HasAllTagsExact(_) => Joins {
                tags: true,
                ..Joins::default()
            },
            Predicate::TestName(_)
            | Predicate::TestUid(_)
            | Predicate::TestGroupIn(_)
            | Predicate::TestUidIn(_) => Joins {
                test: true,
                ..Joins::default()
            },
            Predicate::Parameter { .. } => Joins {
                parameters: true,
                ..Joins::default()
            },
        }
    }

    fn matches(&self, scan: &ExecutionScan<'_>) -> bool {
        match self {
            Predicate::StartedFrom(from) => scan.row.started >= *from,
            Predicate::StartedTo(to) => scan.row.started <= *to,
            Predicate::HasAllTagsFolded(wanted) => {
                let tags = scan.tags.unwrap_or(&[]);
                wanted
                    .iter()
                    .all(|want| tags.iter().any(|t| t.to_lowercase() == *want))
            }
            Predicate::HasNoTagsFolded(banned) => {
                let tags = scan.tags.unwrap_or(&[]);
                !tags.iter().any(|t| banned.contains(&t.to_lowercase()))
            }
            Predicate::TestName(m) => scan.test.is_some_and(|t| m.matches(&t.name)),
            Predicate::TestUid(m) => scan.test.is_some_and(|t| m.matches(&t.uid)),
            Predicate::TestGroupIn(groups) => {
                scan.test.is_some_and(|t| groups.contains(&t.group))
            }
            Predicate::Parameter { name, pattern } => scan
                .parameters
                .unwrap_or(&[])
                .iter()
                .any(|p| p.name == *name && pattern.matches(&p.value)),
            Predicate::HasAllTagsExact(wanted) => {
                let tags = scan.tags.unwrap_or(&[]);
                wanted.iter().all(|want| tags.iter().any(|t| t == want))
            }
            Predicate::TestUidIn(uids) => scan.test.is_some_and(|t| uids.contains(&t.uid)),
        }
    }
}

fn build_predicates(
    criteria: &ExecutionSearchCriteria,
    session: &SessionContext,
) -> Result<Vec<Predicate>, StoreError> {
    let mut predicates = Vec::new();
    if let Some(from) = criteria.started_from {
        predicates.push(Predicate::StartedFrom(from));
    }
    if let Some(to) = criteria.started_to {
        predicates.push(Predicate::StartedTo(to));
    }
    let tag_query = TagQuery::parse(criteria.tag_query.as_deref().unwrap_or(""));
    if !tag_query.included.is_empty() {
        predicates.push(Predicate::HasAllTagsFolded(tag_query.included));
    }
    if !tag_query.excluded.is_empty() {
        predicates.push(Predicate::HasNoTagsFolded(tag_query.excluded));
    }
    if let Some(name) = criteria.test_name.as_deref() {
        predicates.push(Predicate::TestName(TextMatch::from_user(name)?));
    }
    if let Some(uid) = criteria.test_uid.as_deref() {
        predicates.push(Predicate::TestUid(TextMatch::from_user(uid)?));
    }
    if criteria.group_filter == GroupFilter::MyGroups {
        predicates.push(Predicate::TestGroupIn(session.groups.clone()));
    }
    for criterion in &criteria.parameters {
        // an empty value means "parameter present, any value"
        let raw = criterion
            .value
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or("%");
        predicates.push(Predicate::Parameter {
            name: criterion.name.clone(),
            pattern: LikePattern::new(raw, false)?,
        });
    }
    Ok(predicates)
}

fn collect_hits<'t>(tables: &'t Tables, predicates: &[Predicate]) -> Vec<&'t ExecutionRow> {
    let joins = predicates
        .iter()
        .fold(Joins::default(), |acc, p| acc.union(p.joins()));
    let mut hits: Vec<&ExecutionRow> = Vec::new();
    for row in tables.executions.values() {
        let scan = ExecutionScan {
            row,
            test: if joins.test {
                tables.tests.get(&row.test_id)
            } else {
                None
            },
            tags: if joins.tags {
                Some(tables.tags.get(&row.id).map(Vec::as_slice).unwrap_or(&[]))
            } else {
                None
            },
            parameters: if joins.parameters {
                Some(
                    tables
                        .parameters
                        .get(&row.id)
                        .map(Vec::as_slice)
                        .unwrap_or(&[]),
                )
            } else {
                None
            },
        };
        if predicates.iter().all(|p| p.matches(&scan)) {
            hits.push(row);
        }
    }
    hits.sort_by(|a, b| (a.started, a.id).cmp(&(b.started, b.id)));
    hits
}

fn window_slice<T>(hits: &[T], window: LastWindow) -> &[T] {
    let start = hits.len().saturating_sub(window.last_from);
    let end = (start + window.how_many).min(hits.len());
    &hits[start..end]
}

/// The displayed-parameter rule, applied as a second pass keyed by
/// execution id after the main query: when any criterion is displayed, each
/// hit carries only the parameters whose names are displayed; otherwise
/// hits carry no parameters at all. Values are never loaded on this path.
fn attach_result_data(
    tables: &Tables,
    hits: &[&ExecutionRow],
    criteria: &[ParamCriterion],
) -> Vec<TestExecution> {
    let displayed: BTreeSet<&str> = criteria
        .iter()
        .filter(|c| c.displayed)
        .map(|c| c.name.as_str())
        .collect();
    let mut results: Vec<TestExecution> = hits
        .iter()
        .map(|row| {
            let mut exec = base_execution(row);
            exec.tags = tables.tags.get(&row.id).cloned().unwrap_or_default();
            exec
        })
        .collect();
    if !displayed.is_empty() {
        for exec in &mut results {
            exec.parameters = tables
                .parameters
                .get(&exec.id)
                .map(|params| {
                    params
                        .iter()
                        .filter(|p| displayed.contains(p.name.as_str()))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
        }
    }
    results
}

impl Repository {
    /// Criteria search. Results come back oldest first with tags attached
    /// in their original case; parameters follow the displayed rule and
    /// values are never loaded.
    pub fn search(
        &self,
        criteria: &ExecutionSearchCriteria,
        session: &SessionContext,
    ) -> Result<Vec<TestExecution>, StoreError> {
        let predicates = build_predicates(criteria, session)?;
        let tables = self.lock()?;
        let hits = collect_hits(&tables, &predicates);
        Ok(attach_result_data(&tables, &hits, &criteria.parameters))
    }

    /// Same predicates as [`Repository::search`], restricted to a window
    /// counted back from the newest matching execution.
    pub fn search_last(
        &self,
        criteria: &ExecutionSearchCriteria,
        window: LastWindow,
        session: &SessionContext,
    ) -> Result<Vec<TestExecution>, StoreError> {
        let predicates = build_predicates(criteria, session)?;
        let tables = self.lock()?;
        let hits = collect_hits(&tables, &predicates);
        let slice = window_slice(&hits, window);
        Ok(attach_result_data(&tables, slice, &criteria.parameters))
    }

    /// Fetch for report building: every given tag present (case-sensitive
    /// exact), test UID in the given set, oldest first, fully hydrated.
    pub fn executions_for_report(
        &self,
        tags: &[String],
        test_uids: &[String],
        window: Option<LastWindow>,
    ) -> Result<Vec<TestExecution>, StoreError> {
        let mut predicates = Vec::new();
        if !tags.is_empty() {
            predicates.push(Predicate::HasAllTagsExact(tags.iter().cloned().collect()));
        }
        if !test_uids.is_empty() {
            predicates.push(Predicate::TestUidIn(test_uids.iter().cloned().collect()));
        }
        let tables = self.lock()?;
        let hits = collect_hits(&tables, &predicates);
        let slice = match window {
            Some(w) => window_slice(&hits, w),
            None => &hits[..],
        };
        Ok(slice
            .iter()
            .map(|row| hydrated_execution(&tables, row))
            .collect())
    }

    /// Newest-first data points for one metric of one test, optionally
    /// restricted to executions carrying all given tags (case-sensitive).
    pub fn metric_history(
        &self,
        test_id: TestId,
        metric: &str,
        tags: &[String],
        limit: usize,
    ) -> Result<Vec<DataPoint>, StoreError> {
        let tables = self.lock()?;
        let wanted: BTreeSet<&String> = tags.iter().collect();
        let mut points: Vec<(OffsetDateTime, ExecutionId, f64)> = Vec::new();
        for row in tables.executions.values() {
            if row.test_id != test_id {
                continue;
            }
            if !wanted.is_empty() {
                let exec_tags = tables.tags.get(&row.id).map(Vec::as_slice).unwrap_or(&[]);
                if !wanted.iter().all(|w| exec_tags.iter().any(|t| &t == w)) {
                    continue;
                }
            }
            if let Some(values) = tables.values.get(&row.id) {
                for value in values.iter().filter(|v| v.metric == metric) {
                    points.push((row.started, row.id, value.result));
                }
            }
        }
        points.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
        points.truncate(limit);
        Ok(points
            .into_iter()
            .map(|(started, execution_id, value)| DataPoint {
                execution_id,
                started,
                value,
            })
            .collect())
    }

    /// First recorded result for the metric in that execution, if any.
    pub fn value_for_metric(
        &self,
        id: ExecutionId,
        metric: &str,
    ) -> Result<Option<f64>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .values
            .get(&id)
            .and_then(|values| values.iter().find(|v| v.metric == metric))
            .map(|v| v.result))
    }
}
