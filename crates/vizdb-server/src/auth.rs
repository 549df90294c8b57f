use std::collections::HashMap;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use uuid::Uuid;
use vizdb_core::{Id, Principal, Role};

use crate::error::ApiError;
use crate::state::AppState;

const SESSION_TTL_DAYS: i64 = 30;

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {e}")))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

struct Session {
    user_id: Id,
    expires_at: DateTime<Utc>,
}

/// Opaque bearer tokens mapped to users. Tokens expire after 30 days;
/// expired entries are dropped on the next lookup.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, user_id: Id) -> Uuid {
        let token = Uuid::new_v4();
        self.sessions.write().insert(
            token,
            Session {
                user_id,
                expires_at: Utc::now() + Duration::days(SESSION_TTL_DAYS),
            },
        );
        token
    }

    pub fn resolve(&self, token: &Uuid) -> Option<Id> {
        let mut sessions = self.sessions.write();
        match sessions.get(token) {
            Some(session) if session.expires_at > Utc::now() => Some(session.user_id),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }
}

/// Resolve the caller from the Authorization header. A token that no
/// longer maps to a live user is treated the same as an expired one.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing authorization header".into()))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("expected a bearer token".into()))?;
    let token = Uuid::parse_str(token.trim())
        .map_err(|_| ApiError::Unauthorized("malformed token".into()))?;
    let user_id = state
        .sessions
        .resolve(&token)
        .ok_or_else(|| ApiError::Unauthorized("invalid or expired token".into()))?;
    let user = state
        .users
        .get(&user_id)
        .ok_or_else(|| ApiError::Unauthorized("invalid or expired token".into()))?;
    Ok(Principal {
        id: user.id,
        role: user.role,
    })
}

pub fn require_role(principal: &Principal, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&principal.role) {
        Ok(())
    } else {
        Err(ApiError::AccessDenied)
    }
}
