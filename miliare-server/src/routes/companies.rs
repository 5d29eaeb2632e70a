//! Company administration endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use miliare_core::policy::{administers_company, is_platform_admin};
use miliare_core::webhook::{generate_secret, hash_secret};
use miliare_core::{can_access, Company, CompanyId, CompanyStatus, NewCompany, Requirement};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use super::session::require_principal;
use crate::error::ServerError;
use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::{DataStore, SessionStore};
use crate::workflow::load_company;

#[derive(Serialize)]
pub struct CompanyListResponse {
    pub success: bool,
    pub companies: Vec<Company>,
}

/// GET /api/companies
pub async fn list_companies<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Result<Json<CompanyListResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    require_principal(&state, &cookies, &headers)?;

    Ok(Json(CompanyListResponse {
        success: true,
        companies: state.data_store.list_companies()?,
    }))
}

#[derive(Serialize)]
pub struct CompanyResponse {
    pub success: bool,
    pub company: Company,
}

/// GET /api/companies/:company_id
pub async fn get_company<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Path(company_id): Path<String>,
) -> Result<Json<CompanyResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    require_principal(&state, &cookies, &headers)?;
    let company = load_company(state.data_store.as_ref(), &CompanyId(company_id))?;

    Ok(Json(CompanyResponse {
        success: true,
        company,
    }))
}

/// POST /api/companies
pub async fn create_company<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Json(req): Json<NewCompany>,
) -> Result<Json<CompanyResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let principal = require_principal(&state, &cookies, &headers)?;
    if !can_access(Some(&principal), &Requirement::platform_admins()) {
        return Err(ServerError::forbidden("creating companies requires an admin"));
    }

    let company = Company::create(req)?;
    state.data_store.create_company(&company)?;

    tracing::info!(company_id = %company.id, name = %company.name, "Company created");

    Ok(Json(CompanyResponse {
        success: true,
        company,
    }))
}

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

/// PUT /api/companies/:company_id/status
pub async fn set_company_status<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Path(company_id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<CompanyResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let principal = require_principal(&state, &cookies, &headers)?;
    if !can_access(Some(&principal), &Requirement::platform_admins()) {
        return Err(ServerError::forbidden("changing company status requires an admin"));
    }

    let status = CompanyStatus::parse(&req.status)
        .ok_or_else(|| ServerError::InvalidStatus(req.status.clone()))?;
    let mut company = load_company(state.data_store.as_ref(), &CompanyId(company_id))?;
    company.status = status;
    state.data_store.update_company(&company)?;

    tracing::info!(company_id = %company.id, status = status.as_str(), "Company status changed");

    Ok(Json(CompanyResponse {
        success: true,
        company,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSecretResponse {
    pub success: bool,
    pub company_id: CompanyId,
    /// Shown once; only its hash is stored
    pub secret: String,
}

/// POST /api/companies/:company_id/webhook_secret
pub async fn rotate_webhook_secret<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Path(company_id): Path<String>,
) -> Result<Json<WebhookSecretResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let principal = require_principal(&state, &cookies, &headers)?;
    let company_id = CompanyId(company_id);
    let allowed = is_platform_admin(&principal) || administers_company(&principal, &company_id);
    if !allowed {
        return Err(ServerError::forbidden(
            "rotating a webhook secret requires an admin of that company",
        ));
    }

    let mut company = load_company(state.data_store.as_ref(), &company_id)?;
    let secret = generate_secret();
    company.webhook_secret_hash = Some(hash_secret(&secret));
    state.data_store.update_company(&company)?;

    tracing::info!(company_id = %company.id, actor = %principal.id, "Webhook secret rotated");

    Ok(Json(WebhookSecretResponse {
        success: true,
        company_id: company.id,
        secret,
    }))
}
