//! Storage-side models and query filters

use chrono::{DateTime, Utc};
use miliare_core::{
    CompanyId, Payment, PaymentStatus, PrincipalId, Referral, ReferralId, ReferralStatus,
};
use serde::{Deserialize, Serialize};

/// Unique session identifier (the bearer token)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// A signed-in session
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub principal_id: PrincipalId,
    pub created_at: DateTime<Utc>,
}

/// Company and upline of a principal, set by an admin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affiliation {
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    #[serde(default)]
    pub team_lead_id: Option<PrincipalId>,
    #[serde(default)]
    pub org_lead_id: Option<PrincipalId>,
}

/// Predicates for listing referrals. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralFilter {
    pub company_id: Option<CompanyId>,
    pub submitted_by: Option<PrincipalId>,
    /// Referrals whose upline snapshot names this lead, or that the lead submitted
    pub team_of: Option<PrincipalId>,
    /// Referrals this principal submitted or is named on as team or org lead
    pub involving: Option<PrincipalId>,
    pub status: Option<ReferralStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl ReferralFilter {
    pub fn matches(&self, referral: &Referral) -> bool {
        self.company_id
            .as_ref()
            .map_or(true, |c| &referral.company_id == c)
            && self
                .submitted_by
                .as_ref()
                .map_or(true, |p| &referral.submitted_by == p)
            && self.team_of.as_ref().map_or(true, |lead| {
                referral.team_lead_id.as_ref() == Some(lead) || &referral.submitted_by == lead
            })
            && self.involving.as_ref().map_or(true, |p| {
                &referral.submitted_by == p
                    || referral.team_lead_id.as_ref() == Some(p)
                    || referral.org_lead_id.as_ref() == Some(p)
            })
            && self.status.map_or(true, |s| referral.status == s)
            && self
                .payment_status
                .map_or(true, |s| referral.payment_status == s)
    }
}

/// Predicates for listing payments. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFilter {
    pub principal_id: Option<PrincipalId>,
    pub referral_id: Option<ReferralId>,
    pub company_id: Option<CompanyId>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        self.principal_id
            .as_ref()
            .map_or(true, |p| payment.principal_id.as_ref() == Some(p))
            && self
                .referral_id
                .as_ref()
                .map_or(true, |r| payment.referral_id.as_ref() == Some(r))
            && self
                .company_id
                .as_ref()
                .map_or(true, |c| payment.company_id.as_ref() == Some(c))
    }
}
