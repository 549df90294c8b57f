//! Compiles declarative query configs (filters + optional grouping +
//! aggregation metrics) into an ordered pipeline of relational stages.
//! Compilation is pure; executing the compiled stages is the backend's
//! job (see [`PipelineBackend`]).

use thiserror::Error;

mod aggregate;
mod backend;
mod config;
mod filter;
mod pipeline;
mod stage;

pub use aggregate::compile_aggregates;
pub use backend::{BackendError, PipelineBackend};
pub use config::{Aggregation, Filter, FilterOp, Metric, QueryConfig};
pub use filter::compile_filters;
pub use pipeline::{assemble, compile};
pub use stage::{
    Accumulator, CountSpec, GroupSpec, MatchSpec, Predicate, ProjectField, ProjectSpec, Stage,
    GROUP_KEY,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("query config produced an empty pipeline")]
    EmptyPipeline,
    #[error("unknown aggregation '{0}'")]
    UnknownAggregation(String),
}
