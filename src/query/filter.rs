//! Predicate translation: label matchers to storage-native filters.
//!
//! Matchers on `__name__` route to the `metric_name` column; every other
//! label routes through the `labels['key']` map accessor. Regex matchers are
//! fully anchored, matching the whole label value rather than a substring,
//! and an absent label evaluates as the empty string for every operator.
//! Both rules replicate Prometheus matcher semantics.

use crate::error::{Error, Result};
use crate::model::{MatchOp, Matcher};
use crate::schema::{
    SampleRow, LABELS_COLUMN, METRICS_TABLE, METRIC_NAME_COLUMN, NAME_LABEL, TIMESTAMP_COLUMN,
    VALUE_COLUMN,
};

use regex::Regex;

/// Column a condition applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    MetricName,
    Label(String),
}

impl Column {
    fn from_label(name: &str) -> Self {
        if name == NAME_LABEL {
            Column::MetricName
        } else {
            Column::Label(name.to_string())
        }
    }

    fn to_sql(&self) -> String {
        match self {
            Column::MetricName => METRIC_NAME_COLUMN.to_string(),
            Column::Label(name) => format!("{}[{}]", LABELS_COLUMN, quote(name)),
        }
    }
}

/// One boolean condition in a translated filter
#[derive(Debug, Clone)]
enum Condition {
    Equal {
        column: Column,
        value: String,
    },
    NotEqual {
        column: Column,
        value: String,
    },
    RegexMatch {
        column: Column,
        regex: Regex,
    },
    NotRegexMatch {
        column: Column,
        regex: Regex,
    },
}

impl Condition {
    fn to_sql(&self) -> String {
        match self {
            Condition::Equal { column, value } => {
                format!("{} = {}", column.to_sql(), quote(value))
            }
            Condition::NotEqual { column, value } => {
                format!("{} != {}", column.to_sql(), quote(value))
            }
            Condition::RegexMatch { column, regex } => {
                format!("match({}, {})", column.to_sql(), quote(regex.as_str()))
            }
            Condition::NotRegexMatch { column, regex } => {
                format!("NOT match({}, {})", column.to_sql(), quote(regex.as_str()))
            }
        }
    }

    fn matches(&self, row: &SampleRow) -> bool {
        let observed = |column: &Column| match column {
            Column::MetricName => row.metric_name.as_str(),
            Column::Label(name) => row.label_value(name),
        };

        match self {
            Condition::Equal { column, value } => observed(column) == value,
            Condition::NotEqual { column, value } => observed(column) != value,
            Condition::RegexMatch { column, regex } => regex.is_match(observed(column)),
            Condition::NotRegexMatch { column, regex } => !regex.is_match(observed(column)),
        }
    }
}

/// A translated filter over the metrics table.
///
/// Holds a typed condition list so the in-memory backend can evaluate it
/// directly; `to_sql` renders the same expression for SQL backends.
#[derive(Debug, Clone, Default)]
pub struct SampleFilter {
    conditions: Vec<Condition>,
    start_ms: Option<i64>,
    end_ms: Option<i64>,
    limit: Option<usize>,
}

/// Translate a matcher list plus optional time bounds into a filter.
///
/// A bound of 0 means unbounded, matching the read protocol. Invalid regex
/// patterns fail the translation with `Error::Query`.
pub fn translate(
    matchers: &[Matcher],
    start_ms: i64,
    end_ms: i64,
    limit: Option<usize>,
) -> Result<SampleFilter> {
    let mut conditions = Vec::with_capacity(matchers.len());

    for matcher in matchers {
        let column = Column::from_label(&matcher.name);
        let condition = match matcher.op {
            MatchOp::Equal => Condition::Equal {
                column,
                value: matcher.value.clone(),
            },
            MatchOp::NotEqual => Condition::NotEqual {
                column,
                value: matcher.value.clone(),
            },
            MatchOp::Regex => Condition::RegexMatch {
                column,
                regex: compile_anchored(&matcher.value)?,
            },
            MatchOp::NotRegex => Condition::NotRegexMatch {
                column,
                regex: compile_anchored(&matcher.value)?,
            },
        };
        conditions.push(condition);
    }

    Ok(SampleFilter {
        conditions,
        start_ms: (start_ms != 0).then_some(start_ms),
        end_ms: (end_ms != 0).then_some(end_ms),
        limit,
    })
}

impl SampleFilter {
    /// Result-size hint, if any
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Evaluate the filter against one row.
    ///
    /// This is the reference semantics; SQL renderings must agree with it.
    pub fn matches(&self, row: &SampleRow) -> bool {
        if let Some(start) = self.start_ms {
            if row.timestamp_ms < start {
                return false;
            }
        }
        if let Some(end) = self.end_ms {
            if row.timestamp_ms > end {
                return false;
            }
        }
        self.conditions.iter().all(|c| c.matches(row))
    }

    /// Render the sample-select statement for SQL backends.
    pub fn to_sql(&self) -> String {
        format!(
            "SELECT {}, {}, {}, {} FROM {}{}{}",
            TIMESTAMP_COLUMN,
            METRIC_NAME_COLUMN,
            LABELS_COLUMN,
            VALUE_COLUMN,
            METRICS_TABLE,
            self.where_sql(),
            self.limit_sql(),
        )
    }

    /// Render a distinct-values statement for one label.
    pub fn to_label_values_sql(&self, label: &str) -> String {
        let column = Column::from_label(label);
        format!(
            "SELECT DISTINCT {} AS label_value FROM {}{}{}",
            column.to_sql(),
            METRICS_TABLE,
            self.where_sql(),
            self.limit_sql(),
        )
    }

    /// Render a distinct-label-names statement over the labels map.
    pub fn to_label_names_sql(&self) -> String {
        format!(
            "SELECT DISTINCT arrayJoin(mapKeys({})) AS label_key FROM {}{}{}",
            LABELS_COLUMN,
            METRICS_TABLE,
            self.where_sql(),
            self.limit_sql(),
        )
    }

    fn where_sql(&self) -> String {
        let mut clauses: Vec<String> = Vec::with_capacity(self.conditions.len() + 2);
        for condition in &self.conditions {
            clauses.push(condition.to_sql());
        }
        if let Some(start) = self.start_ms {
            clauses.push(format!("{} >= {}", TIMESTAMP_COLUMN, start));
        }
        if let Some(end) = self.end_ms {
            clauses.push(format!("{} <= {}", TIMESTAMP_COLUMN, end));
        }

        if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        }
    }

    fn limit_sql(&self) -> String {
        match self.limit {
            Some(limit) => format!(" LIMIT {}", limit),
            None => String::new(),
        }
    }
}

/// Compile a matcher pattern with full-match anchoring.
///
/// `host=~"a.*"` must match the whole value, so `a.*` becomes `^(?:a.*)$`.
fn compile_anchored(pattern: &str) -> Result<Regex> {
    let anchored = format!("^(?:{})$", pattern);
    Regex::new(&anchored)
        .map_err(|e| Error::Query(format!("invalid regex matcher '{}': {}", pattern, e)))
}

/// Quote a string literal for the SQL rendering.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
