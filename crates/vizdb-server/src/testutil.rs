//! Shared fixtures for handler tests: an app state plus helpers that go
//! through the real register/upload/create handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::Json;
use uuid::Uuid;
use vizdb_core::{Id, Role};

use crate::charts::{self, ChartSpec};
use crate::datasources::{self, UploadReq};
use crate::queries::QueryStore;
use crate::state::AppState;
use crate::users::{self, RegisterReq};

pub fn state() -> AppState {
    AppState::new()
}

pub fn state_with_store(queries: Arc<dyn QueryStore>) -> AppState {
    AppState::with_query_store(queries)
}

pub fn auth_headers(token: Uuid) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).expect("valid header value"),
    );
    headers
}

/// Register a user with the given role and return their token and id.
pub async fn register_user(
    state: &AppState,
    email: &str,
    password: &str,
    role: Role,
) -> (Uuid, Id) {
    let resp = users::register(
        State(state.clone()),
        Json(RegisterReq {
            username: email.split('@').next().unwrap_or("user").to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: Some(role),
        }),
    )
    .await
    .expect("registration should succeed");
    (resp.0.token, resp.0.user.id)
}

/// Upload raw CSV text as the given user and return the data source id.
pub async fn upload_csv(state: &AppState, token: Uuid, csv: &str) -> Id {
    let resp = datasources::upload(
        State(state.clone()),
        auth_headers(token),
        Json(UploadReq {
            name: "test data".into(),
            csv: csv.to_string(),
        }),
    )
    .await
    .expect("upload should succeed");
    resp.0.id
}

/// Create a minimal bar chart over the given data source.
pub async fn create_chart(state: &AppState, token: Uuid, source: Id) -> Id {
    let spec: ChartSpec = serde_json::from_value(serde_json::json!({
        "title": "test chart",
        "type": "bar",
        "dataSourceId": source,
        "xAxis": "region",
        "series": [{"yField": "sales"}]
    }))
    .expect("chart spec deserializes");
    let resp = charts::create_chart(State(state.clone()), auth_headers(token), Json(spec))
        .await
        .expect("chart creation should succeed");
    resp.0.id
}
