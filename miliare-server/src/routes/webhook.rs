//! Inbound partner webhooks
//!
//! Partners push referral status changes with their shared secret in the
//! `x-api-key` header. Checks run in a fixed order: credentials (401), body
//! and status value (400), referral existence (404), ownership (403), then
//! the lifecycle rules.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use miliare_core::webhook::{authenticate, hash_secret};
use miliare_core::{
    Actor, AuthorizedCompany, CompanyId, Error as CoreError, ReferralId, ReferralStatus,
};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::{DataStore, SessionStore};
use crate::workflow::{self, load_referral};

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Deserialize)]
pub struct WebhookRequest {
    pub status: String,
    /// Commission pool to assign along with the status change
    #[serde(default)]
    pub amount: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,
    pub referral_id: ReferralId,
    pub status: ReferralStatus,
    pub version: u64,
}

fn presented_key(headers: &HeaderMap) -> &str {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or("")
}

fn unauthorized(reason: &str) -> ServerError {
    tracing::warn!(cause = "unauthorized", reason, "Webhook rejected");
    CoreError::Unauthorized.into()
}

/// POST /webhook/referrals/:referral_id
///
/// The company is identified by the key itself.
pub async fn update_referral_status<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    headers: HeaderMap,
    Path(referral_id): Path<String>,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let key = presented_key(&headers);
    if key.is_empty() {
        return Err(unauthorized("missing key"));
    }

    let company = state
        .data_store
        .find_company_by_webhook_hash(&hash_secret(key))?
        .ok_or_else(|| unauthorized("unknown key"))?;
    let authorized = authenticate(&company, key).map_err(|_| unauthorized("key mismatch"))?;

    apply(&state, &authorized, ReferralId(referral_id), &body)
}

/// POST /webhook/companies/:company_id/referrals/:referral_id
pub async fn update_company_referral_status<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    headers: HeaderMap,
    Path((company_id, referral_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let key = presented_key(&headers);
    let company = state
        .data_store
        .get_company(&CompanyId(company_id))?
        .ok_or_else(|| unauthorized("unknown company"))?;
    let authorized = authenticate(&company, key).map_err(|_| unauthorized("key mismatch"))?;

    apply(&state, &authorized, ReferralId(referral_id), &body)
}

fn apply<D, S, N>(
    state: &AppState<D, S, N>,
    authorized: &AuthorizedCompany,
    referral_id: ReferralId,
    body: &[u8],
) -> Result<Json<WebhookResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let req: WebhookRequest = serde_json::from_slice(body).map_err(CoreError::from)?;
    let to = ReferralStatus::parse(req.status.trim())
        .ok_or_else(|| ServerError::InvalidStatus(req.status.clone()))?;

    let referral = load_referral(state.data_store.as_ref(), &referral_id).map_err(|e| {
        tracing::warn!(
            cause = "not_found",
            company_id = %authorized.company_id(),
            referral_id = %referral_id,
            "Webhook rejected"
        );
        e
    })?;

    if let Err(e) = authorized.check_owns(&referral) {
        tracing::warn!(
            cause = "forbidden",
            company_id = %authorized.company_id(),
            referral_id = %referral_id,
            owner = %referral.company_id,
            "Webhook rejected"
        );
        return Err(e.into());
    }

    let referral = workflow::change_status(
        state,
        &referral,
        to,
        req.amount,
        Actor::Webhook(authorized),
        None,
    )?;

    Ok(Json(WebhookResponse {
        success: true,
        referral_id: referral.id,
        status: referral.status,
        version: referral.version,
    }))
}
