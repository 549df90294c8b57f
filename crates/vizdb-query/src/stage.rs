use std::collections::BTreeMap;

use serde::Serialize;
use vizdb_core::Value;

use crate::config::Aggregation;

/// Field name the Group stage emits its key under; the Project stage
/// renames it back to the grouping column before anything leaves the
/// engine.
pub const GROUP_KEY: &str = "_group";

/// One step of a compiled pipeline. The list is executed in order and is
/// echoed verbatim in query responses, so everything here serializes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum Stage {
    Match(MatchSpec),
    Group(GroupSpec),
    Project(ProjectSpec),
    Count(CountSpec),
}

/// Conjunction of per-column predicates. The map is ordered so compiled
/// pipelines serialize identically run to run.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct MatchSpec {
    pub predicates: BTreeMap<String, Predicate>,
}

impl MatchSpec {
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Last write wins: a second filter on the same column replaces the
    /// first.
    pub fn insert(&mut self, column: String, predicate: Predicate) {
        self.predicates.insert(column, predicate);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    Eq { value: Value },
    Ne { value: Value },
    Gt { value: Value },
    Lt { value: Value },
    Gte { value: Value },
    Lte { value: Value },
    Contains { needle: String },
    In { values: Vec<Value> },
    NotIn { values: Vec<Value> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpec {
    pub key_column: String,
    pub accumulators: Vec<Accumulator>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accumulator {
    /// Output field, taken from the metric alias.
    pub field: String,
    /// Source column the aggregation reads.
    pub column: String,
    pub agg: Aggregation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    pub fields: Vec<ProjectField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectField {
    /// Name the field leaves the stage under.
    pub name: String,
    /// Field it is read from.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountSpec {
    pub field: String,
}
