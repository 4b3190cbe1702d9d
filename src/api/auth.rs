//! Authentication middleware and helpers
//!
//! Users log in with email and password (Argon2 hashes in the `users` table)
//! and receive a random session token. Tokens live in memory with a TTL and
//! are cleared on restart.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::AppState;
use crate::commands::users::{find_credentials, find_user};
use crate::constants::SESSION_HEADER;
use crate::error::{AppError, AppResult};
use crate::models::{SessionUser, User};

/// Hash a password with Argon2 and a fresh salt
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, stored_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::internal(format!("Invalid stored hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Generate a random session token
pub fn generate_session_token() -> String {
    let token: [u8; 32] = rand::thread_rng().gen();
    hex::encode(token)
}

#[derive(Clone, Debug)]
struct SessionEntry {
    user_id: String,
    expires_at: DateTime<Utc>,
}

/// Active session tokens (in-memory, cleared on restart)
///
/// Only the user id is kept; the middleware reloads the user on every
/// request so role changes and deletions apply immediately.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Open a session for `user_id` and return its token
    pub async fn create(&self, user_id: &str, now: DateTime<Utc>) -> String {
        let token = generate_session_token();
        self.sessions.write().await.insert(
            token.clone(),
            SessionEntry {
                user_id: user_id.to_string(),
                expires_at: now + self.ttl,
            },
        );
        token
    }

    /// User id behind `token`; an expired token is dropped on the way
    pub async fn resolve(&self, token: &str, now: DateTime<Utc>) -> Option<String> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                Some(entry) if entry.expires_at > now => return Some(entry.user_id.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        debug!("[Auth] Evicting expired session");
        self.sessions.write().await.remove(token);
        None
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn is_public_path(path: &str) -> bool {
    path.starts_with("/api/auth/") || path == "/api/health" || path.starts_with("/api/cron/")
}

/// Authentication middleware
///
/// Checks for a valid session token in:
/// 1. `Authorization: Bearer <token>` header
/// 2. `X-Alphacore-Session` header
///
/// On success the resolved `SessionUser` is added to the request extensions.
/// `/api/auth/*`, `/api/health` and `/api/cron/*` (guarded by the cron
/// secret instead) pass through. Logout and `me` still need the extension,
/// so a valid token is resolved on those paths too.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let public = is_public_path(request.uri().path());

    let token = extract_session_token(&request);
    let user = match token {
        Some(token) => match session_user(&state, &token).await {
            Ok(user) => user,
            Err(e) => return e.into_response(),
        },
        None => None,
    };

    match user {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None if public => next.run(request).await,
        None => AppError::unauthorized().into_response(),
    }
}

async fn session_user(state: &AppState, token: &str) -> AppResult<Option<SessionUser>> {
    let Some(user_id) = state.sessions.resolve(token, Utc::now()).await else {
        return Ok(None);
    };
    match find_user(&state.db, &user_id).await? {
        Some(user) => Ok(Some(SessionUser::from(&user))),
        None => {
            // The account was deleted while the session was open
            state.sessions.revoke(token).await;
            Ok(None)
        }
    }
}

pub fn extract_session_token(request: &Request<Body>) -> Option<String> {
    // Check Authorization header
    if let Some(auth) = request.headers().get("authorization") {
        if let Ok(auth_str) = auth.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    // Check X-Alphacore-Session header
    if let Some(session) = request.headers().get(SESSION_HEADER) {
        if let Ok(session_str) = session.to_str() {
            return Some(session_str.trim().to_string());
        }
    }

    None
}

// Auth route handlers

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    session_token: String,
    user: User,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::invalid_credentials());
    }

    let Some((user, hash)) = find_credentials(&state.db, &req.email).await? else {
        return Err(AppError::invalid_credentials());
    };
    if !verify_password(&req.password, &hash)? {
        return Err(AppError::invalid_credentials());
    }

    let token = state.sessions.create(&user.id, Utc::now()).await;
    info!("[Auth] {} logged in", user.email);
    Ok(Json(LoginResponse {
        session_token: token,
        user,
    }))
}

pub async fn logout(State(state): State<AppState>, request: Request<Body>) -> StatusCode {
    if let Some(token) = extract_session_token(&request) {
        state.sessions.revoke(&token).await;
    }
    StatusCode::OK
}

pub async fn me(request: Request<Body>) -> AppResult<Json<SessionUser>> {
    request
        .extensions()
        .get::<SessionUser>()
        .cloned()
        .map(Json)
        .ok_or_else(AppError::unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_roundtrip() {
        let hash = hash_password("gizli123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("gizli123", &hash).unwrap());
        assert!(!verify_password("yanlis", &hash).unwrap());
        assert!(verify_password("gizli123", "not-a-hash").is_err());
    }

    #[test]
    fn tokens_are_random_hex() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn expired_sessions_are_evicted() {
        let store = SessionStore::new(1);
        let now = Utc::now();
        let token = store.create("user-1", now).await;

        assert_eq!(store.resolve(&token, now).await.as_deref(), Some("user-1"));
        assert_eq!(store.resolve(&token, now + Duration::hours(2)).await, None);
        assert_eq!(store.len().await, 0);
        assert_eq!(store.resolve("unknown", now).await, None);
    }

    #[tokio::test]
    async fn revoke_drops_token() {
        let store = SessionStore::new(24);
        let token = store.create("user-1", Utc::now()).await;
        assert!(store.revoke(&token).await);
        assert!(!store.revoke(&token).await);
        assert_eq!(store.resolve(&token, Utc::now()).await, None);
    }

    #[test]
    fn token_from_either_header() {
        let bearer = Request::builder()
            .header("authorization", "Bearer abc")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_session_token(&bearer).as_deref(), Some("abc"));

        let custom = Request::builder()
            .header("X-Alphacore-Session", "def")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_session_token(&custom).as_deref(), Some("def"));

        let none = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_session_token(&none), None);
    }

    #[test]
    fn public_paths() {
        assert!(is_public_path("/api/auth/login"));
        assert!(is_public_path("/api/health"));
        assert!(is_public_path("/api/cron/run-scheduled"));
        assert!(!is_public_path("/api/users"));
        assert!(!is_public_path("/api/healthz"));
    }
}
