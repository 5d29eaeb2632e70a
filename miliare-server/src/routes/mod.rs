//! HTTP routes for the Miliare service

mod companies;
mod dashboard;
mod payments;
mod principals;
mod referrals;
mod reports;
mod session;
mod webhook;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::{DataStore, SessionStore};

pub use session::{clear_session_cookie, set_session_cookie};

/// Create the router with all routes
pub fn create_router<D, S, N>(state: Arc<AppState<D, S, N>>) -> Router
where
    D: DataStore + 'static,
    S: SessionStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/api/session", get(session::get_session))
        .route("/api/register", post(session::register))
        .route("/api/logout", post(session::logout))
        .route(
            "/api/companies",
            get(companies::list_companies).post(companies::create_company),
        )
        .route("/api/companies/:company_id", get(companies::get_company))
        .route(
            "/api/companies/:company_id/status",
            put(companies::set_company_status),
        )
        .route(
            "/api/companies/:company_id/webhook_secret",
            post(companies::rotate_webhook_secret),
        )
        .route(
            "/api/principals/:principal_id/groups",
            put(principals::set_groups),
        )
        .route(
            "/api/principals/:principal_id/affiliation",
            put(principals::set_affiliation),
        )
        .route(
            "/api/referrals",
            get(referrals::list_referrals).post(referrals::submit_referral),
        )
        .route("/api/referrals/:referral_id", get(referrals::get_referral))
        .route(
            "/api/referrals/:referral_id/amount",
            put(referrals::assign_amount),
        )
        .route(
            "/api/referrals/:referral_id/status",
            put(referrals::change_status),
        )
        .route(
            "/api/referrals/:referral_id/payment/processed",
            post(referrals::mark_payment_processed),
        )
        .route(
            "/api/referrals/:referral_id/payment/failed",
            post(referrals::mark_payment_failed),
        )
        .route(
            "/api/payments",
            get(payments::list_payments).post(payments::record_manual_payment),
        )
        .route("/api/reports/summary", get(reports::summary))
        .route("/app/:section", get(dashboard::gate_section))
        .route(
            "/webhook/referrals/:referral_id",
            post(webhook::update_referral_status),
        )
        .route(
            "/webhook/companies/:company_id/referrals/:referral_id",
            post(webhook::update_company_referral_status),
        )
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
