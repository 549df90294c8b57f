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

/// Grid placement of a chart on a dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
    #[serde(default = "default_w")]
    pub w: i64,
    #[serde(default = "default_h")]
    pub h: i64,
}

fn default_w() -> i64 {
    6
}

fn default_h() -> i64 {
    4
}

impl Default for Layout {
    fn default() -> Self {
        Self { x: 0, y: 0, w: 6, h: 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Private,
    Shared,
    Public,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardChart {
    pub chart_id: Id,
    #[serde(default)]
    pub layout: Layout,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub id: Id,
    pub name: String,
    pub charts: Vec<DashboardChart>,
    pub access_level: AccessLevel,
    pub shared_with: Vec<Id>,
    pub created_by: Id,
    pub created_at: DateTime<Utc>,
}

impl Dashboard {
    /// Owners and elevated roles always see a dashboard; beyond that the
    /// access level decides.
    pub fn visible_to(&self, principal: &Principal) -> bool {
        if principal.can_access(self.created_by) {
            return true;
        }
        match self.access_level {
            AccessLevel::Private => false,
            AccessLevel::Shared => self.shared_with.contains(&principal.id),
            AccessLevel::Public => true,
        }
    }
}

#[derive(Default)]
pub struct DashboardStore {
    dashboards: RwLock<HashMap<Id, Dashboard>>,
}

impl DashboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, dashboard: Dashboard) {
        self.dashboards.write().insert(dashboard.id, dashboard);
    }

    pub fn get(&self, id: &Id) -> Option<Dashboard> {
        self.dashboards.read().get(id).cloned()
    }

    pub fn remove(&self, id: &Id) -> Option<Dashboard> {
        self.dashboards.write().remove(id)
    }

    pub fn list_visible(&self, principal: &Principal) -> Vec<Dashboard> {
        let mut dashboards: Vec<Dashboard> = self
            .dashboards
            .read()
            .values()
            .filter(|d| d.visible_to(principal))
            .cloned()
            .collect();
        dashboards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        dashboards
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDashboardReq {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub charts: Vec<DashboardChart>,
    #[serde(default)]
    pub access_level: AccessLevel,
    #[serde(default)]
    pub shared_with: Vec<Id>,
}

/// A dashboard needs a name and at least one chart, and every chart it
/// references must be visible to the caller.
fn validate_request(
    state: &AppState,
    principal: &Principal,
    req: &SaveDashboardReq,
) -> Result<(), ApiError> {
    if req.name.trim().is_empty() || req.charts.is_empty() {
        return Err(ApiError::BadRequest(
            "dashboard name and at least one chart required".into(),
        ));
    }
    for entry in &req.charts {
        let chart = state
            .charts
            .get(&entry.chart_id)
            .ok_or(ApiError::NotFound("chart"))?;
        if !principal.can_access(chart.created_by) {
            return Err(ApiError::AccessDenied);
        }
    }
    Ok(())
}

/// `sharedWith` is only meaningful on shared dashboards; anything sent
/// alongside another access level is dropped.
fn shared_with(req: &SaveDashboardReq) -> Vec<Id> {
    if req.access_level == AccessLevel::Shared {
        req.shared_with.clone()
    } else {
        Vec::new()
    }
}

pub async fn save_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SaveDashboardReq>,
) -> Result<Json<Dashboard>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    validate_request(&state, &principal, &req)?;

    let dashboard = Dashboard {
        id: Uuid::new_v4(),
        name: req.name.trim().to_string(),
        charts: req.charts.clone(),
        access_level: req.access_level,
        shared_with: shared_with(&req),
        created_by: principal.id,
        created_at: Utc::now(),
    };
    state.dashboards.insert(dashboard.clone());
    log::info!(
        target: "vizdb::server",
        "dashboard_saved id={} charts={} access={:?}",
        dashboard.id,
        dashboard.charts.len(),
        dashboard.access_level
    );
    Ok(Json(dashboard))
}

pub async fn list_dashboards(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Dashboard>>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    Ok(Json(state.dashboards.list_visible(&principal)))
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Id>,
) -> Result<Json<Dashboard>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    let dashboard = state
        .dashboards
        .get(&id)
        .ok_or(ApiError::NotFound("dashboard"))?;
    if !dashboard.visible_to(&principal) {
        return Err(ApiError::AccessDenied);
    }
    Ok(Json(dashboard))
}

pub async fn update_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Id>,
    Json(req): Json<SaveDashboardReq>,
) -> Result<Json<Dashboard>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    let existing = state
        .dashboards
        .get(&id)
        .ok_or(ApiError::NotFound("dashboard"))?;
    if !principal.can_access(existing.created_by) {
        return Err(ApiError::AccessDenied);
    }
    validate_request(&state, &principal, &req)?;

    let dashboard = Dashboard {
        name: req.name.trim().to_string(),
        charts: req.charts.clone(),
        access_level: req.access_level,
        shared_with: shared_with(&req),
        ..existing
    };
    state.dashboards.insert(dashboard.clone());
    log::info!(target: "vizdb::server", "dashboard_updated id={}", dashboard.id);
    Ok(Json(dashboard))
}

pub async fn delete_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Id>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    let dashboard = state
        .dashboards
        .get(&id)
        .ok_or(ApiError::NotFound("dashboard"))?;
    if !principal.can_access(dashboard.created_by) {
        return Err(ApiError::AccessDenied);
    }
    state.dashboards.remove(&id);
    log::info!(target: "vizdb::server", "dashboard_deleted id={}", id);
    Ok(Json(serde_json::json!({ "deleted": id })))
}

/// Detach one chart from a dashboard. The chart itself is untouched.
pub async fn remove_chart_from_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, chart_id)): Path<(Id, Id)>,
) -> Result<Json<Dashboard>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    let mut dashboard = state
        .dashboards
        .get(&id)
        .ok_or(ApiError::NotFound("dashboard"))?;
    if !principal.can_access(dashboard.created_by) {
        return Err(ApiError::AccessDenied);
    }
    if !dashboard.charts.iter().any(|c| c.chart_id == chart_id) {
        return Err(ApiError::NotFound("chart"));
    }
    dashboard.charts.retain(|c| c.chart_id != chart_id);
    state.dashboards.insert(dashboard.clone());
    log::info!(
        target: "vizdb::server",
        "dashboard_chart_removed dashboard={} chart={}",
        id,
        chart_id
    );
    Ok(Json(dashboard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use vizdb_core::Role;

    const CSV: &str = "region,sales\neast,10\nwest,5\n";

    fn save_req(charts: Vec<DashboardChart>, access: AccessLevel, shared: Vec<Id>) -> SaveDashboardReq {
        SaveDashboardReq {
            name: "ops overview".into(),
            charts,
            access_level: access,
            shared_with: shared,
        }
    }

    async fn chart_for(state: &AppState, token: Uuid) -> Id {
        let source = testutil::upload_csv(state, token, CSV).await;
        testutil::create_chart(state, token, source).await
    }

    #[tokio::test]
    async fn save_fills_default_layout_and_drops_shared_with() {
        let state = testutil::state();
        let (editor, _) = testutil::register_user(&state, "e@x.com", "pw", Role::Editor).await;
        let chart = chart_for(&state, editor).await;

        let req: SaveDashboardReq = serde_json::from_value(serde_json::json!({
            "name": "ops overview",
            "charts": [{"chartId": chart}],
            "sharedWith": [Uuid::new_v4()]
        }))
        .unwrap();
        let dashboard = save_dashboard(State(state.clone()), testutil::auth_headers(editor), Json(req))
            .await
            .unwrap()
            .0;
        assert_eq!(dashboard.charts[0].layout, Layout { x: 0, y: 0, w: 6, h: 4 });
        assert_eq!(dashboard.access_level, AccessLevel::Private);
        // not shared, so the member list is dropped
        assert!(dashboard.shared_with.is_empty());

        let json = serde_json::to_value(&dashboard).unwrap();
        assert_eq!(json["accessLevel"], "private");
        assert_eq!(json["charts"][0]["layout"]["w"], 6);
    }

    #[tokio::test]
    async fn save_requires_name_and_charts() {
        let state = testutil::state();
        let (editor, _) = testutil::register_user(&state, "e@x.com", "pw", Role::Editor).await;
        let chart = chart_for(&state, editor).await;

        let mut req = save_req(
            vec![DashboardChart { chart_id: chart, layout: Layout::default() }],
            AccessLevel::Private,
            vec![],
        );
        req.name = "  ".into();
        match save_dashboard(State(state.clone()), testutil::auth_headers(editor), Json(req)).await {
            Err(ApiError::BadRequest(_)) => {}
            other => panic!("expected bad request, got {other:?}"),
        }

        let req = save_req(vec![], AccessLevel::Private, vec![]);
        match save_dashboard(State(state), testutil::auth_headers(editor), Json(req)).await {
            Err(ApiError::BadRequest(_)) => {}
            other => panic!("expected bad request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn referenced_charts_must_be_visible() {
        let state = testutil::state();
        let (editor, _) = testutil::register_user(&state, "e@x.com", "pw", Role::Editor).await;
        let chart = chart_for(&state, editor).await;

        let req = save_req(
            vec![DashboardChart { chart_id: Uuid::new_v4(), layout: Layout::default() }],
            AccessLevel::Private,
            vec![],
        );
        match save_dashboard(State(state.clone()), testutil::auth_headers(editor), Json(req)).await {
            Err(ApiError::NotFound("chart")) => {}
            other => panic!("expected not found, got {other:?}"),
        }

        let (other_user, _) = testutil::register_user(&state, "o@x.com", "pw", Role::Editor).await;
        let req = save_req(
            vec![DashboardChart { chart_id: chart, layout: Layout::default() }],
            AccessLevel::Private,
            vec![],
        );
        match save_dashboard(State(state), testutil::auth_headers(other_user), Json(req)).await {
            Err(ApiError::AccessDenied) => {}
            other => panic!("expected access denied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn access_levels_gate_visibility() {
        let state = testutil::state();
        let (owner, _) = testutil::register_user(&state, "o@x.com", "pw", Role::Editor).await;
        let (member, member_id) =
            testutil::register_user(&state, "m@x.com", "pw", Role::Viewer).await;
        let (stranger, _) = testutil::register_user(&state, "s@x.com", "pw", Role::Viewer).await;
        let chart = chart_for(&state, owner).await;
        let entry = || vec![DashboardChart { chart_id: chart, layout: Layout::default() }];

        let private = save_dashboard(
            State(state.clone()),
            testutil::auth_headers(owner),
            Json(save_req(entry(), AccessLevel::Private, vec![])),
        )
        .await
        .unwrap()
        .0;
        let shared = save_dashboard(
            State(state.clone()),
            testutil::auth_headers(owner),
            Json(save_req(entry(), AccessLevel::Shared, vec![member_id])),
        )
        .await
        .unwrap()
        .0;
        let public = save_dashboard(
            State(state.clone()),
            testutil::auth_headers(owner),
            Json(save_req(entry(), AccessLevel::Public, vec![])),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(shared.shared_with, vec![member_id]);

        // member: shared and public, not private
        match get_dashboard(State(state.clone()), testutil::auth_headers(member), Path(private.id))
            .await
        {
            Err(ApiError::AccessDenied) => {}
            other => panic!("expected access denied, got {other:?}"),
        }
        assert!(get_dashboard(State(state.clone()), testutil::auth_headers(member), Path(shared.id))
            .await
            .is_ok());
        assert!(get_dashboard(State(state.clone()), testutil::auth_headers(member), Path(public.id))
            .await
            .is_ok());

        // stranger: only public
        match get_dashboard(State(state.clone()), testutil::auth_headers(stranger), Path(shared.id))
            .await
        {
            Err(ApiError::AccessDenied) => {}
            other => panic!("expected access denied, got {other:?}"),
        }
        let listed = list_dashboards(State(state.clone()), testutil::auth_headers(stranger))
            .await
            .unwrap()
            .0;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, public.id);

        let listed = list_dashboards(State(state.clone()), testutil::auth_headers(member))
            .await
            .unwrap()
            .0;
        assert_eq!(listed.len(), 2);

        let (admin, _) = testutil::register_user(&state, "a@x.com", "pw", Role::Admin).await;
        let listed = list_dashboards(State(state), testutil::auth_headers(admin))
            .await
            .unwrap()
            .0;
        assert_eq!(listed.len(), 3);
    }

    #[tokio::test]
    async fn update_and_delete_are_owner_or_admin() {
        let state = testutil::state();
        let (owner, _) = testutil::register_user(&state, "o@x.com", "pw", Role::Editor).await;
        let chart = chart_for(&state, owner).await;
        let entry = vec![DashboardChart { chart_id: chart, layout: Layout::default() }];
        let dashboard = save_dashboard(
            State(state.clone()),
            testutil::auth_headers(owner),
            Json(save_req(entry.clone(), AccessLevel::Public, vec![])),
        )
        .await
        .unwrap()
        .0;

        // public makes it readable, not editable
        let (stranger, _) = testutil::register_user(&state, "s@x.com", "pw", Role::Viewer).await;
        match update_dashboard(
            State(state.clone()),
            testutil::auth_headers(stranger),
            Path(dashboard.id),
            Json(save_req(entry.clone(), AccessLevel::Public, vec![])),
        )
        .await
        {
            Err(ApiError::AccessDenied) => {}
            other => panic!("expected access denied, got {other:?}"),
        }

        let mut renamed = save_req(entry, AccessLevel::Public, vec![]);
        renamed.name = "renamed".into();
        let updated = update_dashboard(
            State(state.clone()),
            testutil::auth_headers(owner),
            Path(dashboard.id),
            Json(renamed),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.created_at, dashboard.created_at);

        let (admin, _) = testutil::register_user(&state, "a@x.com", "pw", Role::Admin).await;
        delete_dashboard(
            State(state.clone()),
            testutil::auth_headers(admin),
            Path(dashboard.id),
        )
        .await
        .unwrap();
        match get_dashboard(State(state), testutil::auth_headers(owner), Path(dashboard.id)).await {
            Err(ApiError::NotFound("dashboard")) => {}
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn chart_can_be_detached() {
        let state = testutil::state();
        let (owner, _) = testutil::register_user(&state, "o@x.com", "pw", Role::Editor).await;
        let source = testutil::upload_csv(&state, owner, CSV).await;
        let first = testutil::create_chart(&state, owner, source).await;
        let second = testutil::create_chart(&state, owner, source).await;

        let dashboard = save_dashboard(
            State(state.clone()),
            testutil::auth_headers(owner),
            Json(save_req(
                vec![
                    DashboardChart { chart_id: first, layout: Layout::default() },
                    DashboardChart { chart_id: second, layout: Layout::default() },
                ],
                AccessLevel::Private,
                vec![],
            )),
        )
        .await
        .unwrap()
        .0;

        let updated = remove_chart_from_dashboard(
            State(state.clone()),
            testutil::auth_headers(owner),
            Path((dashboard.id, first)),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(updated.charts.len(), 1);
        assert_eq!(updated.charts[0].chart_id, second);
        // the chart itself survives
        assert!(state.charts.get(&first).is_some());

        match remove_chart_from_dashboard(
            State(state),
            testutil::auth_headers(owner),
            Path((dashboard.id, first)),
        )
        .await
        {
            Err(ApiError::NotFound("chart")) => {}
            other => panic!("expected not found, got {other:?}"),
        }
    }
}
