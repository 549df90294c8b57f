use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

pub use serde_json::Value as JsonValue;
pub use uuid::Uuid as Id;

/// A normalized scalar. Every value that enters the system, whether a CSV
/// cell or a filter value from a query config, is reduced to one of these
/// five shapes before anything compares or aggregates it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Null,
}

/// A stored record: column name to normalized scalar. Sparse rows are
/// legal; a missing column reads as [`Value::Null`].
pub type Row = BTreeMap<String, Value>;

// Largest integer a JSON number can carry without loss (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl serde::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Value::Number(f) => {
                if (f - f.trunc()).abs() < f64::EPSILON && f.abs() <= MAX_SAFE_INTEGER {
                    serializer.serialize_i64(*f as i64)
                } else {
                    serializer.serialize_f64(*f)
                }
            }
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Timestamp(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            Value::Null => serializer.serialize_none(),
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Normalize an untyped JSON scalar. The rules are ordered and the first
/// match wins:
///
/// 1. null (or any non-scalar) -> Null
/// 2. a typed number or bool passes through unchanged
/// 3. a string is trimmed; empty after trimming -> Null
/// 4. the whole trimmed string parses as a finite number -> Number
/// 5. the lowercased trimmed string is "true"/"false" -> Bool
/// 6. the trimmed string parses as a timestamp -> Timestamp
/// 7. anything else -> Text of the trimmed string, case preserved
pub fn normalize(raw: &JsonValue) -> Value {
    match raw {
        JsonValue::Null => Value::Null,
        JsonValue::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::String(s) => normalize_text(s),
        _ => Value::Null,
    }
}

/// String half of [`normalize`], applied directly to CSV cells.
pub fn normalize_text(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = trimmed.parse::<f64>() {
        if n.is_finite() {
            return Value::Number(n);
        }
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Some(ts) = parse_timestamp(trimmed) {
        return Value::Timestamp(ts);
    }
    Value::Text(trimmed.to_string())
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    None
}

/// Equality as the match stage sees it. Text compares case-insensitively
/// and anchored; Null equals nothing, including Null.
pub fn equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(a), Value::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Value::Text(a), Value::Text(b)) => a.eq_ignore_ascii_case(b),
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
        _ => false,
    }
}

/// Ordering for range predicates. Only numbers order against numbers and
/// timestamps against timestamps; every other pairing is incomparable.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Coerce a row value to a double for sum/avg/min/max accumulators.
/// Values that do not coerce are excluded from the accumulator.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Viewer,
}

impl Role {
    /// Elevated callers bypass per-record ownership checks.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Viewer
    }
}

/// The caller identity the engine cares about: an opaque id plus a role.
#[derive(Clone, Copy, Debug)]
pub struct Principal {
    pub id: Id,
    pub role: Role,
}

impl Principal {
    /// Ownership rule shared by every record type: the owner or an
    /// elevated caller.
    pub fn can_access(&self, owner: Id) -> bool {
        self.role.is_elevated() || self.id == owner
    }
}
