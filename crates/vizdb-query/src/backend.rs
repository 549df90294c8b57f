use thiserror::Error;
use vizdb_core::Row;

use crate::stage::Stage;

/// Diagnostic from an execution backend. Compilation errors never take
/// this shape; by the time a backend runs, the pipeline is well formed.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

/// Executes a compiled pipeline against some row source and materializes
/// the result. The compiler knows nothing about implementations; the
/// storage engine provides the real one and tests substitute their own.
pub trait PipelineBackend: Send + Sync {
    fn execute(&self, stages: &[Stage]) -> Result<Vec<Row>, BackendError>;
}
