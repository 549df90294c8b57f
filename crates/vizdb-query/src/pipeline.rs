use crate::aggregate::compile_aggregates;
use crate::config::QueryConfig;
use crate::filter::compile_filters;
use crate::stage::{MatchSpec, Stage};
use crate::CompileError;

/// Order the compiled pieces: the match stage runs first when it has any
/// predicates, then the aggregation stages. A pipeline with no stages is
/// rejected here, before it can reach a backend.
pub fn assemble(
    match_spec: MatchSpec,
    aggregates: Vec<Stage>,
) -> Result<Vec<Stage>, CompileError> {
    let mut stages = Vec::with_capacity(aggregates.len() + 1);
    if !match_spec.is_empty() {
        stages.push(Stage::Match(match_spec));
    }
    stages.extend(aggregates);
    if stages.is_empty() {
        return Err(CompileError::EmptyPipeline);
    }
    Ok(stages)
}

/// Compile a full config into an executable pipeline.
pub fn compile(config: &QueryConfig) -> Result<Vec<Stage>, CompileError> {
    let match_spec = compile_filters(&config.filters);
    let aggregates = compile_aggregates(config.group_by.as_deref(), &config.metrics)?;
    assemble(match_spec, aggregates)
}
