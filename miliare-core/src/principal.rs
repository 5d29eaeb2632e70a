//! Principals and group memberships

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::company::CompanyId;

/// Stable user identifier assigned by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role tag used for authorization decisions.
///
/// The set is open: tags the service does not know about are kept as
/// [`Group::Other`] so that they round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Group {
    /// Super-role; satisfies every group requirement
    Admin,
    TeamLead,
    PartnerAdmin,
    CompanyAdmin,
    SiteAdmin,
    Other(String),
}

impl Group {
    pub fn as_str(&self) -> &str {
        match self {
            Group::Admin => "admin",
            Group::TeamLead => "teamLead",
            Group::PartnerAdmin => "partnerAdmin",
            Group::CompanyAdmin => "companyAdmin",
            Group::SiteAdmin => "siteAdmin",
            Group::Other(s) => s,
        }
    }
}

impl From<&str> for Group {
    fn from(s: &str) -> Self {
        match s {
            "admin" => Group::Admin,
            "teamLead" => Group::TeamLead,
            "partnerAdmin" => Group::PartnerAdmin,
            "companyAdmin" => Group::CompanyAdmin,
            "siteAdmin" => Group::SiteAdmin,
            other => Group::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Group {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Group {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Group::from(s.as_str()))
    }
}

/// Claims returned by the identity provider for an active session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default, rename = "custom:companyId")]
    pub company_id: Option<String>,
    #[serde(default, rename = "custom:teamLeadId")]
    pub team_lead_id: Option<String>,
    #[serde(default, rename = "custom:orgLeadId")]
    pub org_lead_id: Option<String>,
}

/// Snapshot of an authenticated actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: PrincipalId,
    pub display_name: String,
    pub email: String,
    pub groups: BTreeSet<Group>,
    pub company_id: Option<CompanyId>,
    pub team_lead_id: Option<PrincipalId>,
    pub org_lead_id: Option<PrincipalId>,
}

impl Principal {
    /// Principal with no groups and no affiliations
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: PrincipalId::new(id),
            display_name: display_name.into(),
            email: email.into(),
            groups: BTreeSet::new(),
            company_id: None,
            team_lead_id: None,
            org_lead_id: None,
        }
    }

    pub fn with_groups<I>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = Group>,
    {
        self.groups.extend(groups);
        self
    }

    pub fn with_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn with_upline(mut self, team_lead: Option<PrincipalId>, org_lead: Option<PrincipalId>) -> Self {
        self.team_lead_id = team_lead;
        self.org_lead_id = org_lead;
        self
    }

    /// Build a principal from identity-provider claims
    pub fn from_claims(claims: &IdentityClaims) -> Self {
        let full_name = [claims.given_name.as_deref(), claims.family_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let display_name = if full_name.is_empty() {
            claims.email.clone()
        } else {
            full_name
        };

        let non_empty = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_string);

        Self {
            id: PrincipalId::new(claims.sub.clone()),
            display_name,
            email: claims.email.clone(),
            groups: claims
                .groups
                .iter()
                .map(|g| Group::from(g.as_str()))
                .collect(),
            company_id: non_empty(&claims.company_id).map(CompanyId),
            team_lead_id: non_empty(&claims.team_lead_id).map(PrincipalId),
            org_lead_id: non_empty(&claims.org_lead_id).map(PrincipalId),
        }
    }

    pub fn has_group(&self, group: &Group) -> bool {
        self.groups.contains(group)
    }
}
