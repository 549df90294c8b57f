use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vizdb_core::{Id, Role, Row};
use vizdb_storage::{ingest_csv, Collection, DataSource};

use crate::auth::{authenticate, require_role};
use crate::error::ApiError;
use crate::state::AppState;

const PREVIEW_DEFAULT_LIMIT: usize = 20;
const PREVIEW_MAX_LIMIT: usize = 100;

#[derive(Deserialize)]
pub struct UploadReq {
    pub name: String,
    pub csv: String,
}

pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UploadReq>,
) -> Result<Json<DataSource>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    require_role(&principal, &[Role::Admin, Role::Editor])?;
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".into()));
    }
    let table = ingest_csv(&req.csv).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let collection_name = fresh_collection_name();
    let source = DataSource {
        id: Uuid::new_v4(),
        name: req.name.trim().to_string(),
        collection_name: collection_name.clone(),
        columns: table.columns,
        row_count: table.rows.len(),
        uploaded_by: principal.id,
        created_at: Utc::now(),
    };
    state
        .engine
        .insert_collection(Collection::from_rows(&collection_name, table.rows))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    state.catalog.insert(source.clone());
    log::info!(
        target: "vizdb::server",
        "datasource_uploaded id={} collection={} rows={}",
        source.id,
        source.collection_name,
        source.row_count
    );
    Ok(Json(source))
}

fn fresh_collection_name() -> String {
    let mut suffix = Uuid::new_v4().simple().to_string();
    suffix.truncate(8);
    format!("data_{}_{}", Utc::now().timestamp_millis(), suffix)
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<DataSource>>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    Ok(Json(state.catalog.list_visible(&principal)))
}

#[derive(Deserialize)]
pub struct PreviewParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResp {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub page: usize,
    pub limit: usize,
    pub total_rows: usize,
    pub total_pages: usize,
}

pub async fn preview(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Id>,
    Query(params): Query<PreviewParams>,
) -> Result<Json<PreviewResp>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    let source = state.catalog.get(&id).ok_or(ApiError::NotFound("data source"))?;
    if !principal.can_access(source.uploaded_by) {
        return Err(ApiError::AccessDenied);
    }
    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .unwrap_or(PREVIEW_DEFAULT_LIMIT)
        .clamp(1, PREVIEW_MAX_LIMIT);

    let collection = state
        .engine
        .get(&source.collection_name)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let total_rows = collection.len();
    let rows = collection.scan((page - 1) * limit, limit);
    Ok(Json(PreviewResp {
        columns: source.columns,
        rows,
        page,
        limit,
        total_rows,
        total_pages: (total_rows + limit - 1) / limit,
    }))
}

pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Id>,
) -> Result<Json<bool>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    require_role(&principal, &[Role::Admin, Role::Editor])?;
    let source = state.catalog.get(&id).ok_or(ApiError::NotFound("data source"))?;
    if !principal.can_access(source.uploaded_by) {
        return Err(ApiError::AccessDenied);
    }
    // the backing collection may already be gone; the record removal is
    // what matters
    let _ = state.engine.drop_collection(&source.collection_name);
    state.catalog.remove(&id);
    log::info!(
        target: "vizdb::server",
        "datasource_deleted id={} collection={}",
        id,
        source.collection_name
    );
    Ok(Json(true))
}
