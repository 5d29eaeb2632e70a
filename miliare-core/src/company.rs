//! Partner companies and their compensation structures

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One hundred percent, in basis points
pub const FULL_SHARE_BPS: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub String);

impl CompanyId {
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

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompanyStatus {
    Active,
    Inactive,
}

impl CompanyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompanyStatus::Active => "ACTIVE",
            CompanyStatus::Inactive => "INACTIVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(CompanyStatus::Active),
            "INACTIVE" => Some(CompanyStatus::Inactive),
            _ => None,
        }
    }
}

/// Per-role commission percentages, in basis points (100 = 1%).
///
/// The shares must sum to at most [`FULL_SHARE_BPS`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensationStructure {
    pub agent_bps: u32,
    /// Team lead (SMD)
    pub team_lead_bps: u32,
    /// Organization lead (EVC)
    pub org_lead_bps: u32,
    pub bonus_pool_bps: u32,
    /// Platform share; also receives every rounding remainder
    pub mrn_bps: u32,
    pub contractor_bps: u32,
}

impl CompensationStructure {
    /// Build from whole percentages
    pub fn from_percentages(
        agent: u32,
        team_lead: u32,
        org_lead: u32,
        bonus_pool: u32,
        mrn: u32,
        contractor: u32,
    ) -> Self {
        Self {
            agent_bps: agent * 100,
            team_lead_bps: team_lead * 100,
            org_lead_bps: org_lead * 100,
            bonus_pool_bps: bonus_pool * 100,
            mrn_bps: mrn * 100,
            contractor_bps: contractor * 100,
        }
    }

    pub fn total_bps(&self) -> u64 {
        [
            self.agent_bps,
            self.team_lead_bps,
            self.org_lead_bps,
            self.bonus_pool_bps,
            self.mrn_bps,
            self.contractor_bps,
        ]
        .iter()
        .map(|&bps| u64::from(bps))
        .sum()
    }

    pub fn validate(&self) -> Result<()> {
        let total = self.total_bps();
        if total > u64::from(FULL_SHARE_BPS) {
            return Err(Error::InvalidCompensation(format!(
                "shares sum to {}.{:02}%, above 100%",
                total / 100,
                total % 100
            )));
        }
        Ok(())
    }
}

/// A partner business accepting referrals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub contact_email: String,
    pub website: Option<String>,
    pub description: Option<String>,
    pub status: CompanyStatus,
    pub compensation: CompensationStructure,
    /// Hex SHA-256 of the shared webhook secret; the raw secret is never kept
    #[serde(skip_serializing)]
    pub webhook_secret_hash: Option<String>,
}

/// Fields supplied when an admin creates a company
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCompany {
    pub name: String,
    pub contact_email: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub compensation: CompensationStructure,
}

impl Company {
    /// Validate and build a new, active company
    pub fn create(new: NewCompany) -> Result<Self> {
        if new.name.trim().is_empty() {
            return Err(Error::Validation("company name is required".into()));
        }
        if !new.contact_email.contains('@') {
            return Err(Error::Validation("contact email is invalid".into()));
        }
        new.compensation.validate()?;

        Ok(Self {
            id: CompanyId::generate(),
            name: new.name.trim().to_string(),
            contact_email: new.contact_email,
            website: new.website,
            description: new.description,
            status: CompanyStatus::Active,
            compensation: new.compensation,
            webhook_secret_hash: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == CompanyStatus::Active
    }
}
