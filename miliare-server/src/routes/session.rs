//! Session endpoints: context, development registration, logout

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use miliare_core::policy::is_platform_admin;
use miliare_core::{Group, Principal};
use serde::{Deserialize, Serialize};
use tower_cookies::{Cookie, Cookies};

use crate::error::ServerError;
use crate::identity::{session_token, SESSION_COOKIE};
use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::{DataStore, SessionId, SessionStore};

/// Resolve the caller or fail with `Unauthenticated`
pub(super) fn require_principal<D, S, N>(
    state: &AppState<D, S, N>,
    cookies: &Cookies,
    headers: &HeaderMap,
) -> Result<Principal, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    Ok(state.resolve(cookies, headers)?.require()?)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    /// Admin-equivalent (admin or siteAdmin)
    pub is_admin: bool,
    pub server_time: i64,
}

/// GET /api/session
pub async fn get_session<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Result<Json<SessionContext>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let resolution = state.resolve(&cookies, &headers)?;
    let principal = resolution.principal().cloned();

    Ok(Json(SessionContext {
        authenticated: principal.is_some(),
        is_admin: principal.as_ref().map_or(false, is_platform_admin),
        principal,
        server_time: chrono::Utc::now().timestamp(),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    /// Session token, also set as the session cookie
    pub token: String,
    pub principal: Principal,
}

/// POST /api/register
///
/// Development stand-in for the identity provider's sign-up flow: creates
/// a principal with no groups and signs it in. Company and upline are left
/// empty; admins assign them through the affiliation endpoint.
pub async fn register<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(miliare_core::Error::Validation("a valid email is required".into()).into());
    }

    let display_name = req
        .display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| email.clone());

    let bootstrapped = state.config.is_admin_email(&email);
    let mut groups = BTreeSet::new();
    if bootstrapped {
        groups.insert(Group::Admin);
    }

    let mut principal = Principal::new(uuid::Uuid::new_v4().to_string(), display_name, email);
    principal.groups = groups;

    state.data_store.create_principal(&principal)?;
    let session = state.session_store.create(&principal.id)?;
    set_session_cookie(&cookies, &session.id.0);

    tracing::info!(
        principal_id = %principal.id,
        admin = bootstrapped,
        "Principal registered"
    );

    Ok(Json(RegisterResponse {
        success: true,
        token: session.id.0,
        principal,
    }))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// POST /api/logout
pub async fn logout<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Json<LogoutResponse>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    if let Some(token) = session_token(&cookies, &headers) {
        if let Err(e) = state.session_store.delete(&SessionId(token)) {
            tracing::warn!(error = %e, "Failed to delete session");
        }
    }

    clear_session_cookie(&cookies);

    Json(LogoutResponse { success: true })
}

/// Helper to set session cookie
pub fn set_session_cookie(cookies: &Cookies, session_id: &str) {
    let cookie = Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .build();
    cookies.add(cookie);
}

/// Helper to clear session cookie
pub fn clear_session_cookie(cookies: &Cookies) {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(tower_cookies::cookie::time::Duration::ZERO)
        .build();
    cookies.add(cookie);
}
