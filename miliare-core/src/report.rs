//! Commission aggregation for dashboards
//!
//! Pure read-side computation over a snapshot of referrals and payments.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::company::CompanyId;
use crate::payment::Payment;
use crate::period::{PeriodWindow, YearMonth};
use crate::principal::PrincipalId;
use crate::referral::{PaymentStatus, Referral, ReferralId};

/// Whose numbers to aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum Scope {
    /// Referrals submitted by, and payments made to, one principal
    Principal(PrincipalId),
    /// Referrals whose upline snapshot names this team lead, plus the lead's own.
    /// Earnings are the payments made to the lead or to submitters of those
    /// referrals; pool, platform and other upline shares stay out.
    Team(PrincipalId),
    Company(CompanyId),
    Platform,
}

impl Scope {
    pub fn includes_referral(&self, referral: &Referral) -> bool {
        match self {
            Scope::Principal(id) => &referral.submitted_by == id,
            Scope::Team(lead) => {
                referral.team_lead_id.as_ref() == Some(lead) || &referral.submitted_by == lead
            }
            Scope::Company(id) => &referral.company_id == id,
            Scope::Platform => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyEarnings {
    pub period: YearMonth,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionSummary {
    pub total_earnings: i64,
    pub pending_commissions: i64,
    pub referrals_count: usize,
    pub processed_count: usize,
    /// processed / total, in `0.0..=1.0`; `0.0` when there are no referrals
    pub success_rate: f64,
    pub monthly: Vec<MonthlyEarnings>,
}

/// Aggregate `referrals` and `payments` for `scope` over `window`, where
/// `current` is the month the window ends in.
pub fn summarize(
    referrals: &[Referral],
    payments: &[Payment],
    scope: &Scope,
    window: PeriodWindow,
    current: YearMonth,
) -> CommissionSummary {
    let scoped: Vec<&Referral> = referrals.iter().filter(|r| scope.includes_referral(r)).collect();
    let scoped_ids: HashSet<&ReferralId> = scoped.iter().map(|r| &r.id).collect();
    let members: HashSet<&PrincipalId> = match scope {
        Scope::Team(lead) => std::iter::once(lead)
            .chain(scoped.iter().map(|r| &r.submitted_by))
            .collect(),
        _ => HashSet::new(),
    };

    let in_window: Vec<&Referral> = scoped
        .iter()
        .copied()
        .filter(|r| window.contains_instant(current, &r.created_at))
        .collect();

    let scoped_payments: Vec<&Payment> = payments
        .iter()
        .filter(|p| match scope {
            Scope::Principal(id) => p.principal_id.as_ref() == Some(id),
            Scope::Team(_) => {
                let to_member = p.principal_id.as_ref().map_or(false, |id| members.contains(id));
                let on_team = p.referral_id.as_ref().map_or(true, |rid| scoped_ids.contains(rid));
                to_member && on_team
            }
            Scope::Company(id) => p.company_id.as_ref() == Some(id),
            Scope::Platform => true,
        })
        .collect();

    let windowed_payments: Vec<&Payment> = scoped_payments
        .iter()
        .copied()
        .filter(|p| window.contains(current, p.period))
        .collect();

    let total_earnings: i64 = windowed_payments.iter().map(|p| p.amount).sum();
    let pending_commissions: i64 = in_window
        .iter()
        .filter(|r| r.is_pending_commission())
        .filter_map(|r| r.amount)
        .sum();
    let referrals_count = in_window.len();
    let processed_count = in_window
        .iter()
        .filter(|r| r.payment_status == PaymentStatus::Processed)
        .count();

    let earliest = scoped_payments.iter().map(|p| p.period).min();
    let monthly = window
        .buckets(current, earliest)
        .into_iter()
        .map(|period| MonthlyEarnings {
            period,
            amount: windowed_payments
                .iter()
                .filter(|p| p.period == period)
                .map(|p| p.amount)
                .sum(),
        })
        .collect();

    CommissionSummary {
        total_earnings,
        pending_commissions,
        referrals_count,
        processed_count,
        success_rate: success_rate(processed_count, referrals_count),
        monthly,
    }
}

/// `processed / total`, defined as zero for an empty set
pub fn success_rate(processed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        processed as f64 / total as f64
    }
}
