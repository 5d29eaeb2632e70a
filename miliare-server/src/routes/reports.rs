//! Dashboard commission summaries

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use miliare_core::policy::{administers_company, is_platform_admin};
use miliare_core::report::summarize;
use miliare_core::{
    can_access, CommissionSummary, CompanyId, PeriodWindow, Principal, PrincipalId, Requirement,
    Scope, YearMonth,
};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use super::session::require_principal;
use crate::error::ServerError;
use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::{DataStore, PaymentFilter, ReferralFilter, SessionStore};

#[derive(Deserialize, Default)]
pub struct SummaryQuery {
    /// principal | team | company | platform (default principal)
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub period: Option<PeriodWindow>,
}

/// Decide which scope the caller asked for, and whether they may see it
fn authorize_scope(principal: &Principal, query: &SummaryQuery) -> Result<Scope, ServerError> {
    let platform_admin = is_platform_admin(principal);

    match query.scope.as_deref().unwrap_or("principal") {
        "principal" => {
            let id = query
                .id
                .clone()
                .map(PrincipalId)
                .unwrap_or_else(|| principal.id.clone());
            if id != principal.id && !platform_admin {
                return Err(ServerError::forbidden("cannot view another principal's earnings"));
            }
            Ok(Scope::Principal(id))
        }
        "team" => {
            let lead = query
                .id
                .clone()
                .map(PrincipalId)
                .unwrap_or_else(|| principal.id.clone());
            if platform_admin {
                return Ok(Scope::Team(lead));
            }
            if !can_access(Some(principal), &Requirement::team_leads()) {
                return Err(ServerError::forbidden("team summaries require a team lead"));
            }
            if lead != principal.id {
                return Err(ServerError::forbidden("cannot view another team's earnings"));
            }
            Ok(Scope::Team(lead))
        }
        "company" => {
            let company_id = query
                .id
                .clone()
                .map(CompanyId)
                .or_else(|| principal.company_id.clone())
                .ok_or_else(|| {
                    miliare_core::Error::Validation("company id is required".into())
                })?;
            if !platform_admin && !administers_company(principal, &company_id) {
                return Err(ServerError::forbidden("cannot view another company's earnings"));
            }
            Ok(Scope::Company(company_id))
        }
        "platform" => {
            if !platform_admin {
                return Err(ServerError::forbidden("platform summaries require an admin"));
            }
            Ok(Scope::Platform)
        }
        other => Err(miliare_core::Error::Validation(format!("unknown scope {}", other)).into()),
    }
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub success: bool,
    pub scope: Scope,
    pub period: PeriodWindow,
    #[serde(flatten)]
    pub summary: CommissionSummary,
}

/// GET /api/reports/summary
pub async fn summary<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let principal = require_principal(&state, &cookies, &headers)?;
    let scope = authorize_scope(&principal, &query)?;
    let window = query.period.unwrap_or_default();

    // Narrow the reads; the reporter applies the exact scope rules
    let referral_filter = match &scope {
        Scope::Principal(id) => ReferralFilter {
            submitted_by: Some(id.clone()),
            ..Default::default()
        },
        Scope::Team(lead) => ReferralFilter {
            team_of: Some(lead.clone()),
            ..Default::default()
        },
        Scope::Company(id) => ReferralFilter {
            company_id: Some(id.clone()),
            ..Default::default()
        },
        Scope::Platform => ReferralFilter::default(),
    };
    let payment_filter = match &scope {
        Scope::Principal(id) => PaymentFilter {
            principal_id: Some(id.clone()),
            ..Default::default()
        },
        Scope::Company(id) => PaymentFilter {
            company_id: Some(id.clone()),
            ..Default::default()
        },
        Scope::Team(_) | Scope::Platform => PaymentFilter::default(),
    };

    let referrals = state.data_store.list_referrals(&referral_filter)?;
    let payments = state.data_store.list_payments(&payment_filter)?;
    let current = YearMonth::of(&Utc::now());

    let summary = summarize(&referrals, &payments, &scope, window, current);

    Ok(Json(SummaryResponse {
        success: true,
        scope,
        period: window,
        summary,
    }))
}
