use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vizdb_core::{Id, Role};

use crate::auth::{authenticate, hash_password, require_role, verify_password};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// What leaves the API: a user without the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Default)]
pub struct UserStore {
    users: RwLock<HashMap<Id, User>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert if the email is free; the check and the insert share one
    /// lock so two concurrent registrations cannot race.
    pub fn create(&self, user: User) -> bool {
        let mut users = self.users.write();
        if users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
        {
            return false;
        }
        users.insert(user.id, user);
        true
    }

    pub fn get(&self, id: &Id) -> Option<User> {
        self.users.read().get(id).cloned()
    }

    pub fn find_by_email(&self, email: &str) -> Option<User> {
        self.users
            .read()
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    pub fn list(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.read().values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        users
    }

    pub fn set_role(&self, id: &Id, role: Role) -> bool {
        match self.users.write().get_mut(id) {
            Some(user) => {
                user.role = role;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &Id) -> bool {
        self.users.write().remove(id).is_some()
    }
}

#[derive(Deserialize)]
pub struct RegisterReq {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Deserialize)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResp {
    pub token: Uuid,
    pub user: PublicUser,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterReq>,
) -> Result<Json<AuthResp>, ApiError> {
    if req.username.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username, email and password are required".into(),
        ));
    }
    let user = User {
        id: Uuid::new_v4(),
        username: req.username.trim().to_string(),
        email: req.email.trim().to_ascii_lowercase(),
        role: req.role.unwrap_or_default(),
        password_hash: hash_password(&req.password)?,
        created_at: Utc::now(),
    };
    let public = PublicUser::from(&user);
    if !state.users.create(user) {
        return Err(ApiError::BadRequest("user already exists".into()));
    }
    let token = state.sessions.issue(public.id);
    log::info!(
        target: "vizdb::server",
        "user_registered id={} role={}",
        public.id,
        public.role.as_str()
    );
    Ok(Json(AuthResp {
        token,
        user: public,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> Result<Json<AuthResp>, ApiError> {
    // one message for both unknown email and bad password
    let denied = || ApiError::Unauthorized("invalid credentials".into());
    let user = state
        .users
        .find_by_email(req.email.trim())
        .ok_or_else(denied)?;
    if !verify_password(&req.password, &user.password_hash) {
        return Err(denied());
    }
    let token = state.sessions.issue(user.id);
    Ok(Json(AuthResp {
        token,
        user: PublicUser::from(&user),
    }))
}

pub async fn profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PublicUser>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    let user = state
        .users
        .get(&principal.id)
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(PublicUser::from(&user)))
}

pub async fn all_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    authenticate(&state, &headers)?;
    let users = state.users.list().iter().map(PublicUser::from).collect();
    Ok(Json(users))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleReq {
    pub user_id: Id,
    pub role: Role,
}

pub async fn update_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateRoleReq>,
) -> Result<Json<PublicUser>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    require_role(&principal, &[Role::Admin])?;
    if !state.users.set_role(&req.user_id, req.role) {
        return Err(ApiError::NotFound("user"));
    }
    log::info!(
        target: "vizdb::server",
        "user_role_updated id={} role={} by={}",
        req.user_id,
        req.role.as_str(),
        principal.id
    );
    let user = state
        .users
        .get(&req.user_id)
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(PublicUser::from(&user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<Id>,
) -> Result<Json<bool>, ApiError> {
    let principal = authenticate(&state, &headers)?;
    require_role(&principal, &[Role::Admin])?;
    if user_id == principal.id {
        return Err(ApiError::BadRequest("cannot delete your own account".into()));
    }
    if !state.users.remove(&user_id) {
        return Err(ApiError::NotFound("user"));
    }
    log::info!(
        target: "vizdb::server",
        "user_deleted id={} by={}",
        user_id,
        principal.id
    );
    Ok(Json(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[tokio::test]
    async fn register_rejects_blank_fields_and_duplicates() {
        let state = testutil::state();
        let req = RegisterReq {
            username: "".into(),
            email: "a@b.c".into(),
            password: "pw".into(),
            role: None,
        };
        match register(State(state.clone()), Json(req)).await {
            Err(ApiError::BadRequest(_)) => {}
            other => panic!("expected bad request, got {other:?}"),
        }

        let first = register(
            State(state.clone()),
            Json(RegisterReq {
                username: "alice".into(),
                email: "alice@example.com".into(),
                password: "pw".into(),
                role: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(first.0.user.role, Role::Viewer);

        // same email, different case
        match register(
            State(state),
            Json(RegisterReq {
                username: "alice2".into(),
                email: "ALICE@example.com".into(),
                password: "pw".into(),
                role: None,
            }),
        )
        .await
        {
            Err(ApiError::BadRequest(msg)) => assert_eq!(msg, "user already exists"),
            other => panic!("expected bad request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn login_is_uniform_about_failures() {
        let state = testutil::state();
        testutil::register_user(&state, "bob@example.com", "right-password", Role::Viewer).await;

        match login(
            State(state.clone()),
            Json(LoginReq {
                email: "bob@example.com".into(),
                password: "wrong".into(),
            }),
        )
        .await
        {
            Err(ApiError::Unauthorized(msg)) => assert_eq!(msg, "invalid credentials"),
            other => panic!("expected unauthorized, got {other:?}"),
        }
        match login(
            State(state.clone()),
            Json(LoginReq {
                email: "nobody@example.com".into(),
                password: "whatever".into(),
            }),
        )
        .await
        {
            Err(ApiError::Unauthorized(msg)) => assert_eq!(msg, "invalid credentials"),
            other => panic!("expected unauthorized, got {other:?}"),
        }

        let ok = login(
            State(state),
            Json(LoginReq {
                email: "Bob@Example.com".into(),
                password: "right-password".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(ok.0.user.email, "bob@example.com");
    }

    #[tokio::test]
    async fn profile_requires_a_valid_token() {
        let state = testutil::state();
        match profile(State(state.clone()), HeaderMap::new()).await {
            Err(ApiError::Unauthorized(_)) => {}
            other => panic!("expected unauthorized, got {other:?}"),
        }

        let (token, id) =
            testutil::register_user(&state, "carol@example.com", "pw", Role::Editor).await;
        let me = profile(State(state), testutil::auth_headers(token))
            .await
            .unwrap();
        assert_eq!(me.0.id, id);
        assert_eq!(me.0.role, Role::Editor);
    }

    #[tokio::test]
    async fn role_updates_are_admin_only() {
        let state = testutil::state();
        let (admin_token, admin_id) =
            testutil::register_user(&state, "admin@example.com", "pw", Role::Admin).await;
        let (viewer_token, viewer_id) =
            testutil::register_user(&state, "v@example.com", "pw", Role::Viewer).await;

        match update_role(
            State(state.clone()),
            testutil::auth_headers(viewer_token),
            Json(UpdateRoleReq {
                user_id: admin_id,
                role: Role::Viewer,
            }),
        )
        .await
        {
            Err(ApiError::AccessDenied) => {}
            other => panic!("expected access denied, got {other:?}"),
        }

        let updated = update_role(
            State(state.clone()),
            testutil::auth_headers(admin_token),
            Json(UpdateRoleReq {
                user_id: viewer_id,
                role: Role::Editor,
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.0.role, Role::Editor);
    }

    #[tokio::test]
    async fn deleting_yourself_is_rejected() {
        let state = testutil::state();
        let (admin_token, admin_id) =
            testutil::register_user(&state, "admin@example.com", "pw", Role::Admin).await;
        match delete_user(
            State(state.clone()),
            testutil::auth_headers(admin_token),
            Path(admin_id),
        )
        .await
        {
            Err(ApiError::BadRequest(_)) => {}
            other => panic!("expected bad request, got {other:?}"),
        }

        let (_, other_id) =
            testutil::register_user(&state, "x@example.com", "pw", Role::Viewer).await;
        let deleted = delete_user(
            State(state.clone()),
            testutil::auth_headers(admin_token),
            Path(other_id),
        )
        .await
        .unwrap();
        assert!(deleted.0);
        assert!(state.users.get(&other_id).is_none());
    }
}
