//! Gated dashboard views
//!
//! The views themselves are rendered client-side; this route decides whether
//! a section may be shown and redirects when it may not.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use miliare_core::policy::gate;
use miliare_core::{Principal, RouteDecision, Section};
use serde::Serialize;
use tower_cookies::Cookies;

use crate::error::ServerError;
use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::{DataStore, SessionStore};

#[derive(Serialize)]
pub struct SectionResponse {
    pub success: bool,
    pub section: Section,
    pub principal: Principal,
}

/// GET /app/:section
pub async fn gate_section<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Path(section): Path<String>,
) -> Result<Response, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let section =
        Section::parse(&section).ok_or_else(|| ServerError::not_found("section", section.clone()))?;

    // An unreachable identity provider is shown as signed out, never as an error page
    let principal = match state.resolve(&cookies, &headers) {
        Ok(resolution) => resolution.principal().cloned(),
        Err(e) => {
            tracing::error!(error = %e, "Identity unavailable for dashboard view");
            None
        }
    };

    let response = match (gate(principal.as_ref(), section), principal) {
        (RouteDecision::Render, Some(principal)) => Json(SectionResponse {
            success: true,
            section,
            principal,
        })
        .into_response(),
        (RouteDecision::RedirectToDefault, _) => {
            tracing::debug!(?section, "Section denied, redirecting to default view");
            Redirect::to(&state.config.default_view).into_response()
        }
        // Public sections do not exist, so rendering always has a principal
        (RouteDecision::Render, None) | (RouteDecision::RedirectToLogin, _) => {
            Redirect::to(&state.config.login_view).into_response()
        }
    };

    Ok(response)
}
