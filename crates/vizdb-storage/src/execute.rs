use std::cmp::Ordering;
use std::collections::BTreeMap;

use vizdb_core::{as_number, compare_values, equal, Row, Value};
use vizdb_query::{
    Accumulator, Aggregation, BackendError, GroupSpec, MatchSpec, PipelineBackend, Predicate,
    ProjectSpec, Stage, GROUP_KEY,
};

use crate::Collection;

impl PipelineBackend for Collection {
    fn execute(&self, stages: &[Stage]) -> Result<Vec<Row>, BackendError> {
        let mut rows = self.snapshot();
        for stage in stages {
            rows = apply_stage(rows, stage);
        }
        Ok(rows)
    }
}

fn apply_stage(rows: Vec<Row>, stage: &Stage) -> Vec<Row> {
    match stage {
        Stage::Match(spec) => rows
            .into_iter()
            .filter(|row| matches_row(spec, row))
            .collect(),
        Stage::Group(spec) => group_rows(rows, spec),
        Stage::Project(spec) => rows.iter().map(|row| project_row(row, spec)).collect(),
        Stage::Count(spec) => {
            let mut row = Row::new();
            row.insert(spec.field.clone(), Value::Number(rows.len() as f64));
            vec![row]
        }
    }
}

/// All predicates of a match spec must hold. A column absent from the
/// row evaluates as Null, so equality, orderings, `contains` and `in`
/// fail on it while their negations succeed.
pub fn matches_row(spec: &MatchSpec, row: &Row) -> bool {
    spec.predicates.iter().all(|(column, predicate)| {
        let value = row.get(column).unwrap_or(&Value::Null);
        matches_value(predicate, value)
    })
}

fn matches_value(predicate: &Predicate, value: &Value) -> bool {
    match predicate {
        Predicate::Eq { value: target } => equal(value, target),
        Predicate::Ne { value: target } => !equal(value, target),
        Predicate::Gt { value: target } => {
            matches!(compare_values(value, target), Some(Ordering::Greater))
        }
        Predicate::Lt { value: target } => {
            matches!(compare_values(value, target), Some(Ordering::Less))
        }
        Predicate::Gte { value: target } => matches!(
            compare_values(value, target),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Predicate::Lte { value: target } => matches!(
            compare_values(value, target),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Predicate::Contains { needle } => match value {
            Value::Text(text) => text
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase()),
            _ => false,
        },
        Predicate::In { values } => values.iter().any(|candidate| equal(value, candidate)),
        Predicate::NotIn { values } => !values.iter().any(|candidate| equal(value, candidate)),
    }
}

/// Grouping key. Ordered so bucket iteration, and therefore result row
/// order, is stable across runs.
#[derive(Debug, Clone, PartialEq)]
struct GroupKey(Value);

impl Eq for GroupKey {}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        value_order(&self.0, &other.0)
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn value_order(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::Timestamp(_) => 3,
            Value::Text(_) => 4,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        // normalized numbers are always finite
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[derive(Clone, Default)]
struct AccState {
    count: u64,
    sum: f64,
    numeric_count: u64,
    min: Option<f64>,
    max: Option<f64>,
}

impl AccState {
    /// Count counts the row no matter what the column holds; the numeric
    /// accumulators only see values that coerce to a number.
    fn observe(&mut self, value: Option<&Value>) {
        self.count += 1;
        if let Some(n) = value.and_then(as_number) {
            self.sum += n;
            self.numeric_count += 1;
            self.min = Some(self.min.map_or(n, |m| m.min(n)));
            self.max = Some(self.max.map_or(n, |m| m.max(n)));
        }
    }

    fn finish(&self, agg: Aggregation) -> Value {
        match agg {
            Aggregation::Count => Value::Number(self.count as f64),
            Aggregation::Sum => Value::Number(self.sum),
            Aggregation::Avg => {
                if self.numeric_count == 0 {
                    Value::Null
                } else {
                    Value::Number(self.sum / self.numeric_count as f64)
                }
            }
            Aggregation::Min => self.min.map(Value::Number).unwrap_or(Value::Null),
            Aggregation::Max => self.max.map(Value::Number).unwrap_or(Value::Null),
        }
    }
}

fn group_rows(rows: Vec<Row>, spec: &GroupSpec) -> Vec<Row> {
    let mut buckets: BTreeMap<GroupKey, Vec<AccState>> = BTreeMap::new();
    for row in rows {
        let key = GroupKey(row.get(&spec.key_column).cloned().unwrap_or(Value::Null));
        let states = buckets
            .entry(key)
            .or_insert_with(|| vec![AccState::default(); spec.accumulators.len()]);
        for (state, acc) in states.iter_mut().zip(&spec.accumulators) {
            state.observe(row.get(&acc.column));
        }
    }
    buckets
        .into_iter()
        .map(|(key, states)| {
            let mut out = Row::new();
            // a null bucket leaves the key absent, like any sparse row
            if !key.0.is_null() {
                out.insert(GROUP_KEY.to_string(), key.0);
            }
            for (state, Accumulator { field, agg, .. }) in states.iter().zip(&spec.accumulators) {
                out.insert(field.clone(), state.finish(*agg));
            }
            out
        })
        .collect()
}

fn project_row(row: &Row, spec: &ProjectSpec) -> Row {
    let mut out = Row::new();
    for field in &spec.fields {
        if let Some(value) = row.get(&field.source) {
            out.insert(field.name.clone(), value.clone());
        }
    }
    out
}
