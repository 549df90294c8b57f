use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use vizdb_core::{Id, Role, Row};
use vizdb_query::{compile, PipelineBackend, QueryConfig, Stage};

use crate::auth::{authenticate, require_role};
use crate::error::ApiError;
use crate::state::AppState;

pub const DEFAULT_MAX_RESULT_ROWS: usize = 10_000;

/// A persisted query run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRecord {
    pub id: Id,
    pub data_source_id: Id,
    pub name: String,
    pub config: QueryConfig,
    pub result: Vec<Row>,
    pub created_by: Id,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("result of {rows} rows exceeds the persistence cap of {cap}")]
    ResultTooLarge { rows: usize, cap: usize },
}

/// Persistence for query runs. A trait so the run path can be tested
/// against a store that fails.
pub trait QueryStore: Send + Sync {
    fn create(&self, record: QueryRecord) -> Result<(), StoreError>;
    fn get(&self, id: &Id) -> Option<QueryRecord>;
}

/// In-memory store with a cap on persisted result size. Results over
/// the cap are still returned to the caller, they just are not kept.
pub struct InMemoryQueryStore {
    max_result_rows: usize,
    records: RwLock<HashMap<Id, QueryRecord>>,
}

impl InMemoryQueryStore {
    pub fn new(max_result_rows: usize) -> Self {
        Self {
            max_result_rows,
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl QueryStore for InMemoryQueryStore {
    fn create(&self, record: QueryRecord) -> Result<(), StoreError> {
        if record.result.len() > self.max_result_rows {
            return Err(StoreError::ResultTooLarge {
                rows: record.result.len(),
                cap: self.max_result_rows,
            });
        }
        self.records.write().insert(record.id, record);
        Ok(())
    }

    fn get(&self, id: &Id) -> Option<QueryRecord> {
        self.records.read().get(id).cloned()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryReq {
    pub data_source_id: Option<Id>,
    pub name: Option<String>,
    pub config: Option<QueryConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResp {
    /// Absent when the run computed but could not be persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<Id>,
    pub result: Vec<Row>,
    /// The compiled stage list, echoed exactly as executed.
    pub pipeline: Vec<Stage>,
}

/// The query path: validate, check ownership, compile, execute, persist.
/// Ownership is checked before any compilation happens, and a
/// persistence failure never turns a computed result into an error.
pub async fn run_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RunQueryReq>,
) -> Result<Json<RunQueryResp>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    require_role(&principal, &[Role::Admin, Role::Editor])?;

    let (data_source_id, name, config) = match (req.data_source_id, req.name, req.config) {
        (Some(id), Some(name), Some(config)) if !name.trim().is_empty() => (id, name, config),
        _ => {
            return Err(ApiError::InvalidQueryConfig(
                "dataSourceId, name and config are required".into(),
            ))
        }
    };

    let source = state
        .catalog
        .get(&data_source_id)
        .ok_or(ApiError::NotFound("data source"))?;
    if !principal.can_access(source.uploaded_by) {
        return Err(ApiError::AccessDenied);
    }

    let stages = compile(&config).map_err(|e| ApiError::InvalidQueryConfig(e.to_string()))?;
    let collection = state
        .engine
        .get(&source.collection_name)
        .map_err(|e| ApiError::ExecutionFailed(e.to_string()))?;
    let result = run_pipeline(collection.as_ref(), &stages)?;

    let record = QueryRecord {
        id: Uuid::new_v4(),
        data_source_id,
        name: name.trim().to_string(),
        config,
        result: result.clone(),
        created_by: principal.id,
        created_at: Utc::now(),
    };
    let query_id = persist_run(state.queries.as_ref(), record);

    log::info!(
        target: "vizdb::server",
        "query_executed data_source={} stages={} rows={} persisted={}",
        data_source_id,
        stages.len(),
        result.len(),
        query_id.is_some()
    );
    Ok(Json(RunQueryResp {
        query_id,
        result,
        pipeline: stages,
    }))
}

fn run_pipeline(backend: &dyn PipelineBackend, stages: &[Stage]) -> Result<Vec<Row>, ApiError> {
    backend
        .execute(stages)
        .map_err(|e| ApiError::ExecutionFailed(e.to_string()))
}

fn persist_run(store: &dyn QueryStore, record: QueryRecord) -> Option<Id> {
    let id = record.id;
    match store.create(record) {
        Ok(()) => Some(id),
        Err(e) => {
            log::warn!(
                target: "vizdb::server",
                "query_persist_failed id={} reason={}",
                id,
                e
            );
            None
        }
    }
}

pub async fn get_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Id>,
) -> Result<Json<QueryRecord>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    let record = state.queries.get(&id).ok_or(ApiError::NotFound("query"))?;
    if !principal.can_access(record.created_by) {
        return Err(ApiError::AccessDenied);
    }
    Ok(Json(record))
}
