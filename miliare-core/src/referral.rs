//! Referral lifecycle
//!
//! ```text
//! IN_PROGRESS ──► IN_REVIEW ──► PAID
//!      │              │
//!      └──► REJECTED ◄┘
//! ```
//!
//! `PAID` and `REJECTED` are terminal. Payment status is tracked separately
//! and can only become `PROCESSED` once the referral is `PAID`.
//!
//! Every operation takes the current referral by reference and returns the
//! updated copy, so a failed operation never leaves a half-applied change.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commission::{CommissionSplit, ShareRole};
use crate::company::{Company, CompanyId};
use crate::payment::{Payment, PaymentId, PaymentType};
use crate::period::YearMonth;
use crate::policy::{administers_company, can_access, is_platform_admin, Requirement};
use crate::principal::{Principal, PrincipalId};
use crate::webhook::AuthorizedCompany;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferralId(pub String);

impl ReferralId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferralStatus {
    InProgress,
    InReview,
    Paid,
    Rejected,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::InProgress => "IN_PROGRESS",
            ReferralStatus::InReview => "IN_REVIEW",
            ReferralStatus::Paid => "PAID",
            ReferralStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IN_PROGRESS" => Some(ReferralStatus::InProgress),
            "IN_REVIEW" => Some(ReferralStatus::InReview),
            "PAID" => Some(ReferralStatus::Paid),
            "REJECTED" => Some(ReferralStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReferralStatus::Paid | ReferralStatus::Rejected)
    }

    /// Whether `self -> to` is an edge of the lifecycle graph
    pub fn can_transition_to(&self, to: ReferralStatus) -> bool {
        use ReferralStatus::*;
        matches!(
            (self, to),
            (InProgress, InReview) | (InReview, Paid) | (InProgress, Rejected) | (InReview, Rejected)
        )
    }
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processed => "PROCESSED",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "PROCESSED" => Some(PaymentStatus::Processed),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// Client details captured at submission
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub client_name: String,
    pub client_contact: String,
}

/// A client lead submitted to a partner company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    pub id: ReferralId,
    pub company_id: CompanyId,
    pub submitted_by: PrincipalId,
    pub client_name: String,
    pub client_contact: String,
    pub approximate_value: i64,
    pub status: ReferralStatus,
    pub payment_status: PaymentStatus,
    /// Commission pool in minor currency units
    pub amount: Option<i64>,
    pub per_role_amounts: Option<CommissionSplit>,
    /// Upline snapshot taken at submission; never rewritten
    pub team_lead_id: Option<PrincipalId>,
    pub org_lead_id: Option<PrincipalId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Operator-facing reason for the last failed payment
    pub payment_failure_reason: Option<String>,
    /// Optimistic concurrency counter, bumped by the store on every write
    pub version: u64,
}

/// Who is asking for a referral mutation
#[derive(Debug, Clone, Copy)]
pub enum Actor<'a> {
    Principal(&'a Principal),
    Webhook(&'a AuthorizedCompany),
}

impl Actor<'_> {
    /// Identifier for logs
    pub fn describe(&self) -> String {
        match self {
            Actor::Principal(p) => format!("principal:{}", p.id),
            Actor::Webhook(c) => format!("webhook:{}", c.company_id()),
        }
    }

    /// May this actor mutate referrals owned by `company_id`?
    pub fn authorize(&self, company_id: &CompanyId) -> Result<()> {
        match *self {
            Actor::Principal(p) => {
                if !can_access(Some(p), &Requirement::referral_operators()) {
                    return Err(Error::forbidden("referral updates require an operator group"));
                }
                if is_platform_admin(p) || administers_company(p, company_id) {
                    Ok(())
                } else {
                    Err(Error::forbidden("referral belongs to another company"))
                }
            }
            Actor::Webhook(authorized) => {
                if authorized.company_id() == company_id {
                    Ok(())
                } else {
                    Err(Error::forbidden("webhook key is for another company"))
                }
            }
        }
    }
}

impl Referral {
    /// Submit a new referral to an active company
    pub fn submit(
        principal: &Principal,
        company: &Company,
        client: ClientInfo,
        approximate_value: i64,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if !company.is_active() {
            return Err(Error::CompanyInactive(company.id.to_string()));
        }
        if client.client_name.trim().is_empty() {
            return Err(Error::Validation("client name is required".into()));
        }
        if client.client_contact.trim().is_empty() {
            return Err(Error::Validation("client contact is required".into()));
        }
        if approximate_value < 0 {
            return Err(Error::Validation("approximate value cannot be negative".into()));
        }

        Ok(Self {
            id: ReferralId::generate(),
            company_id: company.id.clone(),
            submitted_by: principal.id.clone(),
            client_name: client.client_name.trim().to_string(),
            client_contact: client.client_contact.trim().to_string(),
            approximate_value,
            status: ReferralStatus::InProgress,
            payment_status: PaymentStatus::Pending,
            amount: None,
            per_role_amounts: None,
            team_lead_id: principal.team_lead_id.clone(),
            org_lead_id: principal.org_lead_id.clone(),
            created_at: now,
            updated_at: now,
            paid_at: None,
            payment_failure_reason: None,
            version: 0,
        })
    }

    /// Set the commission pool while the referral is still open
    pub fn assign_amount(&self, amount: i64, actor: Actor<'_>, now: DateTime<Utc>) -> Result<Self> {
        actor.authorize(&self.company_id)?;
        if self.status.is_terminal() {
            return Err(Error::Validation(format!(
                "amount cannot change once the referral is {}",
                self.status
            )));
        }
        if amount < 0 {
            return Err(Error::Validation("amount cannot be negative".into()));
        }

        let mut next = self.clone();
        next.amount = Some(amount);
        next.updated_at = now;
        Ok(next)
    }

    /// Move to `to`; entering `PAID` fixes the per-role split.
    ///
    /// `company` must be the referral's owning company.
    pub fn transition(
        &self,
        to: ReferralStatus,
        actor: Actor<'_>,
        company: &Company,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        actor.authorize(&self.company_id)?;
        if company.id != self.company_id {
            return Err(Error::Validation(format!(
                "company {} does not own referral {}",
                company.id, self.id
            )));
        }
        if !self.status.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to,
            });
        }

        let mut next = self.clone();
        if to == ReferralStatus::Paid {
            let amount = self.amount.ok_or(Error::MissingAmount)?;
            next.per_role_amounts = Some(CommissionSplit::compute(amount, &company.compensation));
        }
        next.status = to;
        next.updated_at = now;
        Ok(next)
    }

    /// Mark the payout as processed and derive one payment per non-zero share
    pub fn mark_payment_processed(
        &self,
        actor: Actor<'_>,
        now: DateTime<Utc>,
    ) -> Result<(Self, Vec<Payment>)> {
        actor.authorize(&self.company_id)?;
        if self.status != ReferralStatus::Paid {
            return Err(Error::NotPayable {
                status: self.status,
            });
        }
        if self.payment_status == PaymentStatus::Processed {
            return Err(Error::PaymentAlreadyProcessed(self.id.to_string()));
        }
        let split = self.per_role_amounts.ok_or(Error::MissingAmount)?;

        let period = YearMonth::of(&now);
        let payments = split
            .entries()
            .into_iter()
            .filter(|(_, amount)| *amount != 0)
            .map(|(role, amount)| Payment {
                id: PaymentId::generate(),
                principal_id: self.payee(role),
                referral_id: Some(self.id.clone()),
                company_id: Some(self.company_id.clone()),
                role: Some(role),
                amount,
                payment_type: match role {
                    ShareRole::BonusPool => PaymentType::BonusPool,
                    _ => PaymentType::Commission,
                },
                period,
                processed_at: now,
            })
            .collect();

        let mut next = self.clone();
        next.payment_status = PaymentStatus::Processed;
        next.paid_at = Some(now);
        next.payment_failure_reason = None;
        next.updated_at = now;
        Ok((next, payments))
    }

    /// Record a failed payout. No payments are emitted.
    pub fn mark_payment_failed(
        &self,
        actor: Actor<'_>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        actor.authorize(&self.company_id)?;
        if self.status != ReferralStatus::Paid {
            return Err(Error::NotPayable {
                status: self.status,
            });
        }
        if self.payment_status == PaymentStatus::Processed {
            return Err(Error::PaymentAlreadyProcessed(self.id.to_string()));
        }

        let mut next = self.clone();
        next.payment_status = PaymentStatus::Failed;
        next.payment_failure_reason = Some(reason.trim().to_string()).filter(|r| !r.is_empty());
        next.updated_at = now;
        Ok(next)
    }

    /// Individual recipient of a share, if there is one
    fn payee(&self, role: ShareRole) -> Option<PrincipalId> {
        match role {
            ShareRole::Agent => Some(self.submitted_by.clone()),
            ShareRole::TeamLead => self.team_lead_id.clone(),
            ShareRole::OrgLead => self.org_lead_id.clone(),
            ShareRole::BonusPool | ShareRole::Contractor | ShareRole::Mrn => None,
        }
    }

    /// Still earning toward a commission: open, or paid but not yet disbursed
    pub fn is_pending_commission(&self) -> bool {
        matches!(
            self.status,
            ReferralStatus::InProgress | ReferralStatus::InReview
        ) || (self.status == ReferralStatus::Paid && self.payment_status == PaymentStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::company::{CompanyStatus, CompensationStructure};
    use crate::principal::Group;

    fn company() -> Company {
        Company {
            id: CompanyId::new("c-1"),
            name: "Acme".into(),
            contact_email: "ops@acme.test".into(),
            website: None,
            description: None,
            status: CompanyStatus::Active,
            compensation: CompensationStructure::from_percentages(45, 8, 5, 15, 20, 7),
            webhook_secret_hash: None,
        }
    }

    fn agent() -> Principal {
        Principal::new("agent-1", "Agent", "agent@example.com").with_upline(
            Some(PrincipalId::new("lead-1")),
            Some(PrincipalId::new("org-1")),
        )
    }

    fn site_admin() -> Principal {
        Principal::new("ops-1", "Ops", "ops@example.com").with_groups([Group::SiteAdmin])
    }

    fn client() -> ClientInfo {
        ClientInfo {
            client_name: "Jane Client".into(),
            client_contact: "jane@client.test".into(),
        }
    }

    fn submitted() -> Referral {
        Referral::submit(&agent(), &company(), client(), 25_000, Utc::now()).unwrap()
    }

    #[test]
    fn test_edges() {
        use ReferralStatus::*;
        let all = [InProgress, InReview, Paid, Rejected];
        let allowed = [
            (InProgress, InReview),
            (InReview, Paid),
            (InProgress, Rejected),
            (InReview, Rejected),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_submit_snapshots_upline() {
        let referral = submitted();
        assert_eq!(referral.status, ReferralStatus::InProgress);
        assert_eq!(referral.payment_status, PaymentStatus::Pending);
        assert_eq!(referral.submitted_by, PrincipalId::new("agent-1"));
        assert_eq!(referral.team_lead_id, Some(PrincipalId::new("lead-1")));
        assert_eq!(referral.org_lead_id, Some(PrincipalId::new("org-1")));
    }

    #[test]
    fn test_submit_to_inactive_company_fails() {
        let mut inactive = company();
        inactive.status = CompanyStatus::Inactive;
        let result = Referral::submit(&agent(), &inactive, client(), 100, Utc::now());
        assert!(matches!(result, Err(Error::CompanyInactive(_))));
    }

    #[test]
    fn test_transition_requires_operator_group() {
        let referral = submitted();
        let submitter = agent();
        let result = referral.transition(
            ReferralStatus::InReview,
            Actor::Principal(&submitter),
            &company(),
            Utc::now(),
        );
        assert!(matches!(result, Err(Error::Forbidden(_))));
    }

    #[test]
    fn test_company_admin_limited_to_own_company() {
        let referral = submitted();
        let other_admin = Principal::new("ca-2", "Other", "o@example.com")
            .with_groups([Group::CompanyAdmin])
            .with_company(CompanyId::new("c-2"));
        let own_admin = Principal::new("ca-1", "Own", "w@example.com")
            .with_groups([Group::CompanyAdmin])
            .with_company(CompanyId::new("c-1"));

        let denied = referral.transition(
            ReferralStatus::InReview,
            Actor::Principal(&other_admin),
            &company(),
            Utc::now(),
        );
        assert!(matches!(denied, Err(Error::Forbidden(_))));

        let moved = referral
            .transition(
                ReferralStatus::InReview,
                Actor::Principal(&own_admin),
                &company(),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(moved.status, ReferralStatus::InReview);
    }

    #[test]
    fn test_paid_without_amount_fails() {
        let admin = site_admin();
        let referral = submitted()
            .transition(ReferralStatus::InReview, Actor::Principal(&admin), &company(), Utc::now())
            .unwrap();
        let result =
            referral.transition(ReferralStatus::Paid, Actor::Principal(&admin), &company(), Utc::now());
        assert!(matches!(result, Err(Error::MissingAmount)));
        assert_eq!(referral.status, ReferralStatus::InReview);
    }

    #[test]
    fn test_paid_computes_split() {
        let admin = site_admin();
        let actor = Actor::Principal(&admin);
        let referral = submitted()
            .transition(ReferralStatus::InReview, actor, &company(), Utc::now())
            .unwrap()
            .assign_amount(10_000, actor, Utc::now())
            .unwrap()
            .transition(ReferralStatus::Paid, actor, &company(), Utc::now())
            .unwrap();

        let split = referral.per_role_amounts.unwrap();
        assert_eq!(split.agent, 4500);
        assert_eq!(split.mrn, 2000);
        assert_eq!(split.total(), 10_000);
    }

    #[test]
    fn test_no_transition_out_of_terminal_states() {
        let admin = site_admin();
        let actor = Actor::Principal(&admin);
        let rejected = submitted()
            .transition(ReferralStatus::Rejected, actor, &company(), Utc::now())
            .unwrap();
        let result = rejected.transition(ReferralStatus::InProgress, actor, &company(), Utc::now());
        assert!(matches!(
            result,
            Err(Error::InvalidTransition {
                from: ReferralStatus::Rejected,
                to: ReferralStatus::InProgress
            })
        ));
    }

    #[test]
    fn test_payment_processed_emits_payments() {
        let admin = site_admin();
        let actor = Actor::Principal(&admin);
        let paid = submitted()
            .transition(ReferralStatus::InReview, actor, &company(), Utc::now())
            .unwrap()
            .assign_amount(10_000, actor, Utc::now())
            .unwrap()
            .transition(ReferralStatus::Paid, actor, &company(), Utc::now())
            .unwrap();

        let (processed, payments) = paid.mark_payment_processed(actor, Utc::now()).unwrap();
        assert_eq!(processed.payment_status, PaymentStatus::Processed);
        assert!(processed.paid_at.is_some());
        assert_eq!(payments.len(), 6);
        assert_eq!(payments.iter().map(|p| p.amount).sum::<i64>(), 10_000);

        let bonus: Vec<_> = payments
            .iter()
            .filter(|p| p.payment_type == PaymentType::BonusPool)
            .collect();
        assert_eq!(bonus.len(), 1);
        assert_eq!(bonus[0].amount, 1500);

        let agent_payment = payments.iter().find(|p| p.role == Some(ShareRole::Agent)).unwrap();
        assert_eq!(agent_payment.principal_id, Some(PrincipalId::new("agent-1")));
        assert_eq!(agent_payment.payment_type, PaymentType::Commission);

        let again = processed.mark_payment_processed(actor, Utc::now());
        assert!(matches!(again, Err(Error::PaymentAlreadyProcessed(_))));
    }

    #[test]
    fn test_zero_shares_emit_no_payment() {
        let admin = site_admin();
        let actor = Actor::Principal(&admin);
        let mut c = company();
        c.compensation = CompensationStructure::from_percentages(80, 0, 0, 0, 20, 0);
        let paid = Referral::submit(&agent(), &c, client(), 1, Utc::now())
            .unwrap()
            .transition(ReferralStatus::InReview, actor, &c, Utc::now())
            .unwrap()
            .assign_amount(1_000, actor, Utc::now())
            .unwrap()
            .transition(ReferralStatus::Paid, actor, &c, Utc::now())
            .unwrap();

        let (_, payments) = paid.mark_payment_processed(actor, Utc::now()).unwrap();
        let roles: Vec<_> = payments.iter().filter_map(|p| p.role).collect();
        assert_eq!(roles, vec![ShareRole::Agent, ShareRole::Mrn]);
    }

    #[test]
    fn test_payment_failed_records_reason() {
        let admin = site_admin();
        let actor = Actor::Principal(&admin);
        let paid = submitted()
            .transition(ReferralStatus::InReview, actor, &company(), Utc::now())
            .unwrap()
            .assign_amount(500, actor, Utc::now())
            .unwrap()
            .transition(ReferralStatus::Paid, actor, &company(), Utc::now())
            .unwrap();

        let failed = paid
            .mark_payment_failed(actor, "bank rejected transfer", Utc::now())
            .unwrap();
        assert_eq!(failed.payment_status, PaymentStatus::Failed);
        assert_eq!(
            failed.payment_failure_reason.as_deref(),
            Some("bank rejected transfer")
        );

        // A failed payout can be retried
        let (retried, payments) = failed.mark_payment_processed(actor, Utc::now()).unwrap();
        assert_eq!(retried.payment_status, PaymentStatus::Processed);
        assert!(retried.payment_failure_reason.is_none());
        assert!(!payments.is_empty());
    }

    #[test]
    fn test_assign_amount_rejected_after_terminal() {
        let admin = site_admin();
        let actor = Actor::Principal(&admin);
        let rejected = submitted()
            .transition(ReferralStatus::Rejected, actor, &company(), Utc::now())
            .unwrap();
        assert!(matches!(
            rejected.assign_amount(100, actor, Utc::now()),
            Err(Error::Validation(_))
        ));
    }
}
