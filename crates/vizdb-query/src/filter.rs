use vizdb_core::{normalize, JsonValue, Value};

use crate::config::{Filter, FilterOp};
use crate::stage::{MatchSpec, Predicate};

/// Compile raw filters into a match spec. Filters that cannot contribute
/// a predicate (blank column, value that normalizes to Null, empty
/// membership set) are dropped silently; a filter never fails a query.
pub fn compile_filters(filters: &[Filter]) -> MatchSpec {
    let mut spec = MatchSpec::default();
    for filter in filters {
        let column = filter.column.trim();
        if column.is_empty() {
            continue;
        }
        let op = FilterOp::parse(filter.operator.as_deref());
        if let Some(predicate) = compile_predicate(op, &filter.value) {
            spec.insert(column.to_string(), predicate);
        }
    }
    spec
}

fn compile_predicate(op: FilterOp, raw: &JsonValue) -> Option<Predicate> {
    match op {
        FilterOp::Eq => scalar(raw).map(|value| Predicate::Eq { value }),
        FilterOp::Ne => scalar(raw).map(|value| Predicate::Ne { value }),
        FilterOp::Gt => scalar(raw).map(|value| Predicate::Gt { value }),
        FilterOp::Lt => scalar(raw).map(|value| Predicate::Lt { value }),
        FilterOp::Gte => scalar(raw).map(|value| Predicate::Gte { value }),
        FilterOp::Lte => scalar(raw).map(|value| Predicate::Lte { value }),
        FilterOp::Contains => needle(raw).map(|needle| Predicate::Contains { needle }),
        FilterOp::In => {
            let values = member_set(raw);
            (!values.is_empty()).then_some(Predicate::In { values })
        }
        FilterOp::NotIn => {
            let values = member_set(raw);
            (!values.is_empty()).then_some(Predicate::NotIn { values })
        }
    }
}

fn scalar(raw: &JsonValue) -> Option<Value> {
    match normalize(raw) {
        Value::Null => None,
        value => Some(value),
    }
}

/// The substring needle keeps the textual form of the value, so
/// `contains "42"` searches for the characters even though "42" would
/// normalize to a number.
fn needle(raw: &JsonValue) -> Option<String> {
    let text = match raw {
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// A bare scalar is treated as a one-element set. Elements that
/// normalize to Null are dropped.
fn member_set(raw: &JsonValue) -> Vec<Value> {
    let elements: Vec<&JsonValue> = match raw {
        JsonValue::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    elements
        .into_iter()
        .map(normalize)
        .filter(|value| !value.is_null())
        .collect()
}
