use crate::config::{Aggregation, Metric};
use crate::stage::{Accumulator, CountSpec, GroupSpec, ProjectField, ProjectSpec, Stage, GROUP_KEY};
use crate::CompileError;

/// Compile the aggregation half of a config.
///
/// With a group column: a Group stage (one accumulator per usable
/// metric) followed by a Project stage that renames the synthetic key
/// back to the column name. Without one: a single Count stage when the
/// config is exactly one count metric, otherwise no stages at all.
pub fn compile_aggregates(
    group_by: Option<&str>,
    metrics: &[Metric],
) -> Result<Vec<Stage>, CompileError> {
    match group_by.map(str::trim).filter(|column| !column.is_empty()) {
        Some(key) => compile_grouped(key, metrics),
        None => compile_ungrouped(metrics),
    }
}

fn compile_grouped(key: &str, metrics: &[Metric]) -> Result<Vec<Stage>, CompileError> {
    let mut accumulators = Vec::new();
    let mut fields = vec![ProjectField {
        name: key.to_string(),
        source: GROUP_KEY.to_string(),
    }];
    for metric in metrics {
        let column = metric.column.trim();
        if column.is_empty() {
            continue;
        }
        let agg = parse_aggregation(&metric.aggregation)?;
        let field = metric_field(metric, agg, column);
        fields.push(ProjectField {
            name: field.clone(),
            source: field.clone(),
        });
        accumulators.push(Accumulator {
            field,
            column: column.to_string(),
            agg,
        });
    }
    Ok(vec![
        Stage::Group(GroupSpec {
            key_column: key.to_string(),
            accumulators,
        }),
        Stage::Project(ProjectSpec { fields }),
    ])
}

fn compile_ungrouped(metrics: &[Metric]) -> Result<Vec<Stage>, CompileError> {
    if let [metric] = metrics {
        if parse_aggregation(&metric.aggregation)? == Aggregation::Count {
            let field = metric
                .alias
                .as_deref()
                .map(str::trim)
                .filter(|alias| !alias.is_empty())
                .unwrap_or("count")
                .to_string();
            return Ok(vec![Stage::Count(CountSpec { field })]);
        }
        return Ok(Vec::new());
    }
    // still validate names even though no stage comes out of them
    for metric in metrics {
        parse_aggregation(&metric.aggregation)?;
    }
    Ok(Vec::new())
}

fn metric_field(metric: &Metric, agg: Aggregation, column: &str) -> String {
    metric
        .alias
        .as_deref()
        .map(str::trim)
        .filter(|alias| !alias.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}_{}", agg.as_str(), column))
}

fn parse_aggregation(raw: &str) -> Result<Aggregation, CompileError> {
    Aggregation::parse(raw).ok_or_else(|| CompileError::UnknownAggregation(raw.to_string()))
}
