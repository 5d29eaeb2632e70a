//! Session-backed identity provider
//!
//! Session tokens come from the `miliare_session` cookie or an
//! `Authorization: Bearer` header and map to stored principals.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use miliare_core::identity::resolve;
use miliare_core::{
    IdentityClaims, IdentityProvider, Principal, ProviderFailure, Resolution, SessionLookup,
};
use tower_cookies::Cookies;

use crate::error::ServerError;
use crate::store::{DataStore, SessionId, SessionStore};

pub const SESSION_COOKIE: &str = "miliare_session";

/// Identity provider reading sessions and principals from the stores
pub struct SessionIdentityProvider<'a, D, S> {
    data_store: &'a D,
    session_store: &'a S,
}

impl<'a, D, S> SessionIdentityProvider<'a, D, S>
where
    D: DataStore,
    S: SessionStore,
{
    pub fn new(data_store: &'a D, session_store: &'a S) -> Self {
        Self {
            data_store,
            session_store,
        }
    }
}

impl<D, S> IdentityProvider for SessionIdentityProvider<'_, D, S>
where
    D: DataStore,
    S: SessionStore,
{
    fn lookup(&self, token: &str) -> Result<SessionLookup, ProviderFailure> {
        let session = self
            .session_store
            .get(&SessionId(token.to_string()))
            .map_err(|e| ProviderFailure(e.to_string()))?;
        let Some(session) = session else {
            return Ok(SessionLookup::NoSession);
        };

        let principal = self
            .data_store
            .get_principal(&session.principal_id)
            .map_err(|e| ProviderFailure(e.to_string()))?;

        // A session whose principal is gone is treated as signed out
        Ok(match principal {
            Some(principal) => SessionLookup::Active(claims_for(&principal)),
            None => SessionLookup::NoSession,
        })
    }
}

/// Claims as the identity provider would report them for a stored principal
pub fn claims_for(principal: &Principal) -> IdentityClaims {
    IdentityClaims {
        sub: principal.id.to_string(),
        email: principal.email.clone(),
        given_name: Some(principal.display_name.clone()),
        family_name: None,
        phone_number: None,
        address: None,
        groups: principal
            .groups
            .iter()
            .map(|g| g.as_str().to_string())
            .collect(),
        company_id: principal.company_id.as_ref().map(|c| c.to_string()),
        team_lead_id: principal.team_lead_id.as_ref().map(|p| p.to_string()),
        org_lead_id: principal.org_lead_id.as_ref().map(|p| p.to_string()),
    }
}

/// Session token carried by a request, cookie first
pub fn session_token(cookies: &Cookies, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = cookies.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Resolve the request's principal once, for threading through core calls
pub fn resolve_request<D, S>(
    data_store: &D,
    session_store: &S,
    cookies: &Cookies,
    headers: &HeaderMap,
) -> Result<Resolution, ServerError>
where
    D: DataStore,
    S: SessionStore,
{
    let token = session_token(cookies, headers);
    let provider = SessionIdentityProvider::new(data_store, session_store);

    match resolve(&provider, token.as_deref()) {
        Ok(Resolution::Anonymous) => {
            tracing::debug!(had_token = token.is_some(), "No session");
            Ok(Resolution::Anonymous)
        }
        Ok(resolution) => Ok(resolution),
        Err(e) => {
            tracing::warn!(error = %e, "Identity resolution failed");
            Err(e.into())
        }
    }
}
