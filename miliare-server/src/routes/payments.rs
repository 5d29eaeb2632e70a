//! Payment ledger endpoints

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use miliare_core::policy::is_platform_admin;
use miliare_core::{ManualPayment, Payment};
use serde::Serialize;
use tower_cookies::Cookies;

use super::session::require_principal;
use crate::error::ServerError;
use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::{DataStore, PaymentFilter, SessionStore};

#[derive(Serialize)]
pub struct PaymentListResponse {
    pub success: bool,
    pub payments: Vec<Payment>,
}

/// GET /api/payments
///
/// Admins may filter freely; everyone else sees payments made to them.
pub async fn list_payments<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Query(mut filter): Query<PaymentFilter>,
) -> Result<Json<PaymentListResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let principal = require_principal(&state, &cookies, &headers)?;
    if !is_platform_admin(&principal) {
        filter.principal_id = Some(principal.id.clone());
    }

    Ok(Json(PaymentListResponse {
        success: true,
        payments: state.data_store.list_payments(&filter)?,
    }))
}

#[derive(Serialize)]
pub struct PaymentResponse {
    pub success: bool,
    pub payment: Payment,
}

/// POST /api/payments
pub async fn record_manual_payment<D, S, N>(
    State(state): State<Arc<AppState<D, S, N>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Json(req): Json<ManualPayment>,
) -> Result<Json<PaymentResponse>, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let principal = require_principal(&state, &cookies, &headers)?;
    let payment = Payment::record_manual(&principal, req, Utc::now())?;
    state.data_store.create_payment(&payment)?;

    tracing::info!(
        payment_id = %payment.id,
        payment_type = payment.payment_type.as_str(),
        amount = payment.amount,
        actor = %principal.id,
        "Manual payment recorded"
    );

    Ok(Json(PaymentResponse {
        success: true,
        payment,
    }))
}
