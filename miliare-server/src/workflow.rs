//! Referral lifecycle operations against the stores
//!
//! Each operation reads the referral, applies the core rule, and writes the
//! result back conditioned on the version it read. Notices go out only after
//! the write succeeds.

use chrono::Utc;
use miliare_core::{
    Actor, Company, CompanyId, Error as CoreError, Referral, ReferralId, ReferralStatus,
};

use crate::error::ServerError;
use crate::notify::{notify_best_effort, Notice, Notifier};
use crate::state::AppState;
use crate::store::{DataStore, SessionStore};

pub fn load_referral<D: DataStore + ?Sized>(
    data_store: &D,
    id: &ReferralId,
) -> Result<Referral, ServerError> {
    data_store
        .get_referral(id)?
        .ok_or_else(|| ServerError::not_found("referral", id.as_str()))
}

pub fn load_company<D: DataStore + ?Sized>(
    data_store: &D,
    id: &CompanyId,
) -> Result<Company, ServerError> {
    data_store
        .get_company(id)?
        .ok_or_else(|| ServerError::not_found("company", id.as_str()))
}

/// The version a write must be conditioned on.
///
/// Callers may pin the version they last saw; a mismatch is a conflict
/// before any rule runs.
pub fn expected_version(referral: &Referral, pinned: Option<u64>) -> Result<u64, ServerError> {
    match pinned {
        Some(v) if v != referral.version => Err(CoreError::Conflict {
            kind: "referral",
            id: referral.id.to_string(),
            expected: v,
        }
        .into()),
        _ => Ok(referral.version),
    }
}

/// Set the commission pool on an open referral
pub fn assign_amount<D, S, N>(
    state: &AppState<D, S, N>,
    referral: &Referral,
    amount: i64,
    actor: Actor<'_>,
    pinned: Option<u64>,
) -> Result<Referral, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let expected = expected_version(referral, pinned)?;
    let next = referral.assign_amount(amount, actor, Utc::now())?;
    let stored = state.data_store.update_referral(&next, expected)?;

    tracing::info!(
        referral_id = %stored.id,
        actor = %actor.describe(),
        amount,
        "Referral amount assigned"
    );

    Ok(stored)
}

/// Move a referral to `to`, optionally assigning the amount in the same write
pub fn change_status<D, S, N>(
    state: &AppState<D, S, N>,
    referral: &Referral,
    to: ReferralStatus,
    amount: Option<i64>,
    actor: Actor<'_>,
    pinned: Option<u64>,
) -> Result<Referral, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let expected = expected_version(referral, pinned)?;
    let company = load_company(state.data_store.as_ref(), &referral.company_id)?;
    let now = Utc::now();

    let mut next = referral.clone();
    if let Some(amount) = amount {
        // An impossible edge reports InvalidTransition, not a locked amount
        if referral.status.can_transition_to(to) {
            next = next.assign_amount(amount, actor, now)?;
        }
    }
    let next = next.transition(to, actor, &company, now)?;
    let stored = state.data_store.update_referral(&next, expected)?;

    tracing::info!(
        referral_id = %stored.id,
        actor = %actor.describe(),
        from = %referral.status,
        to = %stored.status,
        version = stored.version,
        "Referral status changed"
    );

    notify_best_effort(
        &state.notifier,
        &stored.submitted_by,
        Notice::StatusChanged {
            referral_id: stored.id.clone(),
            status: stored.status,
        },
    );

    Ok(stored)
}

/// Mark a paid referral's payout processed and persist its payments
pub fn process_payment<D, S, N>(
    state: &AppState<D, S, N>,
    referral: &Referral,
    actor: Actor<'_>,
    pinned: Option<u64>,
) -> Result<(Referral, Vec<miliare_core::Payment>), ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let expected = expected_version(referral, pinned)?;
    let (next, payments) = referral.mark_payment_processed(actor, Utc::now())?;
    let stored = state.data_store.record_payout(&next, expected, &payments)?;

    tracing::info!(
        referral_id = %stored.id,
        actor = %actor.describe(),
        payments = payments.len(),
        "Referral payment processed"
    );

    for payment in &payments {
        if let Some(payee) = &payment.principal_id {
            notify_best_effort(
                &state.notifier,
                payee,
                Notice::PaymentProcessed {
                    referral_id: stored.id.clone(),
                    amount: payment.amount,
                },
            );
        }
    }

    Ok((stored, payments))
}

/// Record a failed payout; the submitter only hears that it failed
pub fn fail_payment<D, S, N>(
    state: &AppState<D, S, N>,
    referral: &Referral,
    actor: Actor<'_>,
    reason: &str,
    pinned: Option<u64>,
) -> Result<Referral, ServerError>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    let expected = expected_version(referral, pinned)?;
    let next = referral.mark_payment_failed(actor, reason, Utc::now())?;
    let stored = state.data_store.update_referral(&next, expected)?;

    tracing::warn!(
        referral_id = %stored.id,
        actor = %actor.describe(),
        reason = stored.payment_failure_reason.as_deref().unwrap_or(""),
        "Referral payment failed"
    );

    notify_best_effort(
        &state.notifier,
        &stored.submitted_by,
        Notice::PaymentFailed {
            referral_id: stored.id.clone(),
        },
    );

    Ok(stored)
}
