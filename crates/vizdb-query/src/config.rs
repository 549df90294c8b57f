use serde::{Deserialize, Serialize};
use vizdb_core::JsonValue;

/// The wire shape of a query: everything is optional or defaulted so a
/// sparse config deserializes instead of erroring. The compiler, not the
/// deserializer, decides what is usable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfig {
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub group_by: Option<String>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

/// One requested predicate. `value` stays untyped here; normalization
/// happens during compilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub column: String,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub value: JsonValue,
}

/// One requested aggregation. `aggregation` stays a raw string on the
/// wire; the compiler parses it case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    #[serde(default)]
    pub column: String,
    pub aggregation: String,
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

impl Aggregation {
    pub fn parse(raw: &str) -> Option<Aggregation> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sum" => Some(Aggregation::Sum),
            "avg" => Some(Aggregation::Avg),
            "count" => Some(Aggregation::Count),
            "min" => Some(Aggregation::Min),
            "max" => Some(Aggregation::Max),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Avg => "avg",
            Aggregation::Count => "count",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
    In,
    NotIn,
}

impl FilterOp {
    /// An absent or unrecognized operator compiles as equality. Clients
    /// have always leaned on that default, so it is part of the contract.
    pub fn parse(raw: Option<&str>) -> FilterOp {
        let Some(raw) = raw else { return FilterOp::Eq };
        match raw.trim().to_ascii_lowercase().as_str() {
            "!=" => FilterOp::Ne,
            ">" => FilterOp::Gt,
            "<" => FilterOp::Lt,
            ">=" => FilterOp::Gte,
            "<=" => FilterOp::Lte,
            "contains" => FilterOp::Contains,
            "in" => FilterOp::In,
            "not in" | "not-in" => FilterOp::NotIn,
            _ => FilterOp::Eq,
        }
    }
}
