//! Authorization policy evaluation
//!
//! Every gated view and every gated mutation is decided here, through
//! [`can_access`]. The `admin` group is a super-role: it satisfies any
//! [`Requirement::AnyOfGroups`], whatever groups the requirement names.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::company::CompanyId;
use crate::principal::{Group, Principal};

/// What a caller needs in order to see a view or perform an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Public,
    AuthenticatedOnly,
    AnyOfGroups(BTreeSet<Group>),
}

impl Requirement {
    pub fn any_of<I>(groups: I) -> Self
    where
        I: IntoIterator<Item = Group>,
    {
        Requirement::AnyOfGroups(groups.into_iter().collect())
    }

    /// Who may move referrals through their lifecycle
    pub fn referral_operators() -> Self {
        Self::any_of([Group::CompanyAdmin, Group::PartnerAdmin, Group::SiteAdmin])
    }

    /// Who may manage companies, groups and manual payments
    pub fn platform_admins() -> Self {
        Self::any_of([Group::SiteAdmin])
    }

    /// Operators scoped to their own company
    pub fn company_operators() -> Self {
        Self::any_of([Group::CompanyAdmin, Group::PartnerAdmin])
    }

    pub fn team_leads() -> Self {
        Self::any_of([Group::TeamLead])
    }

    /// Only the super-role itself; grants and revokes of `admin` need this
    pub fn super_role() -> Self {
        Self::any_of([Group::Admin])
    }
}

/// The admin override
fn is_super_role(principal: &Principal) -> bool {
    principal.has_group(&Group::Admin)
}

/// Decide whether `principal` (or an anonymous caller) meets `requirement`
pub fn can_access(principal: Option<&Principal>, requirement: &Requirement) -> bool {
    match (requirement, principal) {
        (Requirement::Public, _) => true,
        (_, None) => false,
        (Requirement::AuthenticatedOnly, Some(_)) => true,
        (Requirement::AnyOfGroups(_), Some(p)) if is_super_role(p) => true,
        (Requirement::AnyOfGroups(groups), Some(p)) => groups.iter().any(|g| p.has_group(g)),
    }
}

/// Admin-equivalent: may act on any company, principal or payout
pub fn is_platform_admin(principal: &Principal) -> bool {
    can_access(Some(principal), &Requirement::platform_admins())
}

/// Company or partner admin affiliated with `company_id`
pub fn administers_company(principal: &Principal, company_id: &CompanyId) -> bool {
    can_access(Some(principal), &Requirement::company_operators())
        && principal.company_id.as_ref() == Some(company_id)
}

/// Dashboard sections behind the route gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    Dashboard,
    Referrals,
    Partners,
    Team,
    Partner,
    Admin,
}

impl Section {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dashboard" => Some(Section::Dashboard),
            "referrals" => Some(Section::Referrals),
            "partners" => Some(Section::Partners),
            "team" => Some(Section::Team),
            "partner" => Some(Section::Partner),
            "admin" => Some(Section::Admin),
            _ => None,
        }
    }

    pub fn requirement(&self) -> Requirement {
        match self {
            Section::Dashboard | Section::Referrals | Section::Partners => {
                Requirement::AuthenticatedOnly
            }
            Section::Team => Requirement::any_of([Group::TeamLead]),
            Section::Partner => Requirement::any_of([Group::PartnerAdmin, Group::CompanyAdmin]),
            Section::Admin => Requirement::any_of([Group::SiteAdmin]),
        }
    }
}

/// Outcome of gating a dashboard view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Render,
    /// Not signed in: send to the login view
    RedirectToLogin,
    /// Signed in but not allowed: send to the default view
    RedirectToDefault,
}

pub fn gate(principal: Option<&Principal>, section: Section) -> RouteDecision {
    if can_access(principal, &section.requirement()) {
        RouteDecision::Render
    } else if principal.is_none() {
        RouteDecision::RedirectToLogin
    } else {
        RouteDecision::RedirectToDefault
    }
}
