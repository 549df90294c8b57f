use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vizdb_core::{Id, Principal};

use crate::auth::authenticate;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    #[default]
    Bar,
    Line,
    Area,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    #[serde(default)]
    pub y_field: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: SeriesKind,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieSpec {
    #[serde(default)]
    pub label_field: String,
    #[serde(default)]
    pub value_field: String,
}

/// Everything the client controls about a chart. The id, owner and
/// timestamp are server-assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub data_source_id: Id,
    #[serde(default)]
    pub query_id: Option<Id>,
    #[serde(default)]
    pub x_axis: Option<String>,
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default)]
    pub pie: Option<PieSpec>,
    #[serde(default)]
    pub stacked: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    pub id: Id,
    #[serde(flatten)]
    pub spec: ChartSpec,
    pub created_by: Id,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct ChartStore {
    charts: RwLock<HashMap<Id, Chart>>,
}

impl ChartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, chart: Chart) {
        self.charts.write().insert(chart.id, chart);
    }

    pub fn get(&self, id: &Id) -> Option<Chart> {
        self.charts.read().get(id).cloned()
    }

    pub fn remove(&self, id: &Id) -> Option<Chart> {
        self.charts.write().remove(id)
    }

    /// Own charts, newest first. Elevated roles see every chart.
    pub fn list_visible(&self, principal: &Principal) -> Vec<Chart> {
        let mut charts: Vec<Chart> = self
            .charts
            .read()
            .values()
            .filter(|chart| principal.can_access(chart.created_by))
            .cloned()
            .collect();
        charts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        charts
    }
}

/// Shape checks that do not need any lookups. Pie charts carry their
/// own field pair; everything else plots series against an x axis.
fn validate_spec(spec: &ChartSpec) -> Result<(), ApiError> {
    if spec.title.trim().is_empty() {
        return Err(ApiError::BadRequest("chart title is required".into()));
    }
    if spec.chart_type == ChartType::Pie {
        let ok = spec.pie.as_ref().is_some_and(|pie| {
            !pie.label_field.trim().is_empty() && !pie.value_field.trim().is_empty()
        });
        if !ok {
            return Err(ApiError::BadRequest(
                "pie charts require labelField and valueField".into(),
            ));
        }
    } else {
        let has_axis = spec
            .x_axis
            .as_ref()
            .is_some_and(|axis| !axis.trim().is_empty());
        if !has_axis || spec.series.is_empty() {
            return Err(ApiError::BadRequest(
                "bar, line and mixed charts require xAxis and at least one series".into(),
            ));
        }
        if spec.series.iter().any(|s| s.y_field.trim().is_empty()) {
            return Err(ApiError::BadRequest(
                "every series needs a yField".into(),
            ));
        }
    }
    Ok(())
}

/// The references a chart carries must resolve and be visible to the
/// caller before anything is stored.
fn validate_references(
    state: &AppState,
    principal: &Principal,
    spec: &ChartSpec,
) -> Result<(), ApiError> {
    let source = state
        .catalog
        .get(&spec.data_source_id)
        .ok_or(ApiError::NotFound("data source"))?;
    if !principal.can_access(source.uploaded_by) {
        return Err(ApiError::AccessDenied);
    }
    if let Some(query_id) = &spec.query_id {
        let record = state
            .queries
            .get(query_id)
            .ok_or(ApiError::NotFound("query"))?;
        if !principal.can_access(record.created_by) {
            return Err(ApiError::AccessDenied);
        }
    }
    Ok(())
}

pub async fn create_chart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(spec): Json<ChartSpec>,
) -> Result<Json<Chart>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    validate_spec(&spec)?;
    validate_references(&state, &principal, &spec)?;

    let chart = Chart {
        id: Uuid::new_v4(),
        spec,
        created_by: principal.id,
        created_at: Utc::now(),
    };
    state.charts.insert(chart.clone());
    log::info!(
        target: "vizdb::server",
        "chart_created id={} type={:?} owner={}",
        chart.id,
        chart.spec.chart_type,
        principal.id
    );
    Ok(Json(chart))
}

pub async fn list_charts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Chart>>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    Ok(Json(state.charts.list_visible(&principal)))
}

pub async fn get_chart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chart_id): Path<Id>,
) -> Result<Json<Chart>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    let chart = state
        .charts
        .get(&chart_id)
        .ok_or(ApiError::NotFound("chart"))?;
    if !principal.can_access(chart.created_by) {
        return Err(ApiError::AccessDenied);
    }
    Ok(Json(chart))
}

pub async fn update_chart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chart_id): Path<Id>,
    Json(spec): Json<ChartSpec>,
) -> Result<Json<Chart>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    let existing = state
        .charts
        .get(&chart_id)
        .ok_or(ApiError::NotFound("chart"))?;
    if !principal.can_access(existing.created_by) {
        return Err(ApiError::AccessDenied);
    }
    validate_spec(&spec)?;
    validate_references(&state, &principal, &spec)?;

    let chart = Chart { spec, ..existing };
    state.charts.insert(chart.clone());
    log::info!(target: "vizdb::server", "chart_updated id={}", chart.id);
    Ok(Json(chart))
}

pub async fn delete_chart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chart_id): Path<Id>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    let chart = state
        .charts
        .get(&chart_id)
        .ok_or(ApiError::NotFound("chart"))?;
    if !principal.can_access(chart.created_by) {
        return Err(ApiError::AccessDenied);
    }
    state.charts.remove(&chart_id);
    log::info!(target: "vizdb::server", "chart_deleted id={}", chart_id);
    Ok(Json(serde_json::json!({ "deleted": chart_id })))
}
