//! Referral endpoints for dashboard users

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use miliare_core::policy::{administers_company, is_platform_admin};
use miliare_core::{
    Actor, ClientInfo, CompanyId, Payment, PaymentStatus, Principal, PrincipalId, Referral,
    ReferralId, ReferralStatus,
};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use super::session::require_principal;
use crate::error::ServerError;
use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::{DataStore, ReferralFilter, SessionStore};
use crate::workflow::{self, load_company, load_referral};

/// Referrals a principal may read
#[derive(Debug, Clone, PartialEq, Eq)]
enum Visibility {
    All,
    /// Everything at one company, plus anything the principal is involved in
    Company(CompanyId),
    /// Only referrals the principal submitted or is upline on
    Involved,
}

fn visibility(principal: &Principal) -> Visibility {
    if is_platform_admin(principal) {
        return Visibility::All;
    }
    match &principal.company_id {
        Some(company_id) if administers_company(principal, company_id) => {
            Visibility::Company(company_id.clone())
        }
        _ => Visibility::Involved,
    }
}

fn is_involved(principal: &Principal, referral: &Referral) -> bool {
    referral.submitted_by == principal.id
        || referral.team_lead_id.as_ref() == Some(&principal.id)
        || referral.org_lead_id.as_ref() == Some(&principal.id)
}

/// Narrow a requested filter to the referrals `principal` may see.
///
/// Company operators see their company by default; asking for another
/// company narrows to their own involvement there.
pub(super) fn visible_filter(principal: &Principal, mut filter: ReferralFilter) -> ReferralFilter {
    match visibility(principal) {
        Visibility::All => {}
        Visibility::Company(company_id) => match &filter.company_id {
            Some(requested) if requested != &company_id => {
                filter.involving = Some(principal.id.clone());
            }
            _ => filter.company_id = Some(company_id),
        },
        Visibility::Involved => filter.involving = Some(principal.id.clone()),
    }
    filter
}

fn can_view(principal: &Principal, referral: &Referral) -> bool {
    match visibility(principal) {
        Visibility::All => true,
        Visibility::Company(company_id) => {
            referral.company_id == company_id || is_involved(principal, referral)
        }
        Visibility::Involved => is_involved(principal, referral),
    }
}

/// Payout failure reasons are for operators only
fn redact_for(principal: &Principal, mut referral: Referral) -> Referral {
    let operator = match visibility(principal) {
        Visibility::All => true,
        Visibility::Company(company_id) => referral.company_id == company_id,
        Visibility::Involved => false,
    };
    if !operator {
        referral.payment_failure_reason = None;
    }
    referral
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListReferralsQuery {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub company_id: Option<String>,
    pub submitted_by: Option<String>,
}

impl ListReferralsQuery {
    fn into_filter(self) -> Result<ReferralFilter, ServerError> {
        let status = self
            .status
            .map(|s| ReferralStatus::parse(&s).ok_or(ServerError::InvalidStatus(s)))
            .transpose()?;
        let payment_status = self
            .payment_status
            .map(|s| PaymentStatus::parse(&s).ok_or(ServerError::InvalidStatus(s)))
            .transpose()?;

        Ok(ReferralFilter {
            company_id: self.company_id.map(CompanyId),
            submitted_by: self.submitted_by.map(PrincipalId),
            team_of: None,
            involving: None,
            status,
            payment_status,
        })
    }
}

#[derive(Serialize)]
pub struct ReferralListResponse {
    pub success: bool,
    pub referrals: Vec<Referral>,
}

/// GET /api/referrals
pub async fn list_referrals<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Query(query): Query<ListReferralsQuery>,
) -> Result<Json<ReferralListResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let principal = require_principal(&state, &cookies, &headers)?;
    let filter = visible_filter(&principal, query.into_filter()?);
    let referrals = state
        .data_store
        .list_referrals(&filter)?
        .into_iter()
        .map(|r| redact_for(&principal, r))
        .collect();

    Ok(Json(ReferralListResponse {
        success: true,
        referrals,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReferralRequest {
    pub company_id: CompanyId,
    pub client_name: String,
    pub client_contact: String,
    #[serde(default)]
    pub approximate_value: i64,
}

#[derive(Serialize)]
pub struct ReferralResponse {
    pub success: bool,
    pub referral: Referral,
}

/// POST /api/referrals
pub async fn submit_referral<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Json(req): Json<SubmitReferralRequest>,
) -> Result<Json<ReferralResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let principal = require_principal(&state, &cookies, &headers)?;
    let company = load_company(state.data_store.as_ref(), &req.company_id)?;

    let referral = Referral::submit(
        &principal,
        &company,
        ClientInfo {
            client_name: req.client_name,
            client_contact: req.client_contact,
        },
        req.approximate_value,
        Utc::now(),
    )?;
    state.data_store.create_referral(&referral)?;

    tracing::info!(
        referral_id = %referral.id,
        company_id = %referral.company_id,
        submitted_by = %referral.submitted_by,
        "Referral submitted"
    );

    Ok(Json(ReferralResponse {
        success: true,
        referral,
    }))
}

/// GET /api/referrals/:referral_id
pub async fn get_referral<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Path(referral_id): Path<String>,
) -> Result<Json<ReferralResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let principal = require_principal(&state, &cookies, &headers)?;
    let referral = load_referral(state.data_store.as_ref(), &ReferralId(referral_id))?;
    if !can_view(&principal, &referral) {
        return Err(ServerError::forbidden("referral is not visible to this principal"));
    }

    Ok(Json(ReferralResponse {
        success: true,
        referral: redact_for(&principal, referral),
    }))
}

#[derive(Deserialize)]
pub struct AssignAmountRequest {
    pub amount: i64,
    #[serde(default)]
    pub version: Option<u64>,
}

/// PUT /api/referrals/:referral_id/amount
pub async fn assign_amount<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Path(referral_id): Path<String>,
    Json(req): Json<AssignAmountRequest>,
) -> Result<Json<ReferralResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let principal = require_principal(&state, &cookies, &headers)?;
    let referral = load_referral(state.data_store.as_ref(), &ReferralId(referral_id))?;
    let referral = workflow::assign_amount(
        &state,
        &referral,
        req.amount,
        Actor::Principal(&principal),
        req.version,
    )?;

    Ok(Json(ReferralResponse {
        success: true,
        referral,
    }))
}

#[derive(Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub version: Option<u64>,
}

/// PUT /api/referrals/:referral_id/status
pub async fn change_status<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Path(referral_id): Path<String>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<ReferralResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let principal = require_principal(&state, &cookies, &headers)?;
    let to = ReferralStatus::parse(&req.status)
        .ok_or_else(|| ServerError::InvalidStatus(req.status.clone()))?;
    let referral = load_referral(state.data_store.as_ref(), &ReferralId(referral_id))?;
    let referral = workflow::change_status(
        &state,
        &referral,
        to,
        req.amount,
        Actor::Principal(&principal),
        req.version,
    )?;

    Ok(Json(ReferralResponse {
        success: true,
        referral,
    }))
}

#[derive(Deserialize, Default)]
pub struct PaymentActionRequest {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub version: Option<u64>,
}

#[derive(Serialize)]
pub struct PaymentProcessedResponse {
    pub success: bool,
    pub referral: Referral,
    pub payments: Vec<Payment>,
}

/// POST /api/referrals/:referral_id/payment/processed
pub async fn mark_payment_processed<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Path(referral_id): Path<String>,
    Json(req): Json<PaymentActionRequest>,
) -> Result<Json<PaymentProcessedResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let principal = require_principal(&state, &cookies, &headers)?;
    let referral = load_referral(state.data_store.as_ref(), &ReferralId(referral_id))?;
    let (referral, payments) =
        workflow::process_payment(&state, &referral, Actor::Principal(&principal), req.version)?;

    Ok(Json(PaymentProcessedResponse {
        success: true,
        referral,
        payments,
    }))
}

/// POST /api/referrals/:referral_id/payment/failed
pub async fn mark_payment_failed<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Path(referral_id): Path<String>,
    Json(req): Json<PaymentActionRequest>,
) -> Result<Json<ReferralResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let principal = require_principal(&state, &cookies, &headers)?;
    let referral = load_referral(state.data_store.as_ref(), &ReferralId(referral_id))?;
    let referral = workflow::fail_payment(
        &state,
        &referral,
        Actor::Principal(&principal),
        req.reason.as_deref().unwrap_or(""),
        req.version,
    )?;

    Ok(Json(ReferralResponse {
        success: true,
        referral,
    }))
}
