//! Disbursed commission records

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commission::ShareRole;
use crate::company::CompanyId;
use crate::period::YearMonth;
use crate::policy::{can_access, Requirement};
use crate::principal::{Principal, PrincipalId};
use crate::referral::ReferralId;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub String);

impl PaymentId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Commission,
    BonusPool,
    Upline,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Commission => "COMMISSION",
            PaymentType::BonusPool => "BONUS_POOL",
            PaymentType::Upline => "UPLINE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COMMISSION" => Some(PaymentType::Commission),
            "BONUS_POOL" => Some(PaymentType::BonusPool),
            "UPLINE" => Some(PaymentType::Upline),
            _ => None,
        }
    }
}

/// A commission disbursement. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    /// Recipient; `None` for shares with no individual payee (pool, platform,
    /// contractor, or an upline slot the submitter did not have)
    pub principal_id: Option<PrincipalId>,
    pub referral_id: Option<ReferralId>,
    pub company_id: Option<CompanyId>,
    pub role: Option<ShareRole>,
    pub amount: i64,
    pub payment_type: PaymentType,
    pub period: YearMonth,
    pub processed_at: DateTime<Utc>,
}

/// Manual payment recorded by an admin outside a referral
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualPayment {
    pub principal_id: PrincipalId,
    pub amount: i64,
    pub payment_type: PaymentType,
    #[serde(default)]
    pub period: Option<YearMonth>,
}

impl Payment {
    /// Record an upline or bonus-pool payment not tied to one referral
    pub fn record_manual(actor: &Principal, manual: ManualPayment, now: DateTime<Utc>) -> Result<Self> {
        if !can_access(Some(actor), &Requirement::platform_admins()) {
            return Err(Error::forbidden("manual payments require an admin"));
        }
        if manual.payment_type == PaymentType::Commission {
            return Err(Error::Validation(
                "commission payments are derived from paid referrals".into(),
            ));
        }
        if manual.amount <= 0 {
            return Err(Error::Validation("payment amount must be positive".into()));
        }

        Ok(Self {
            id: PaymentId::generate(),
            principal_id: Some(manual.principal_id),
            referral_id: None,
            company_id: None,
            role: None,
            amount: manual.amount,
            payment_type: manual.payment_type,
            period: manual.period.unwrap_or_else(|| YearMonth::of(&now)),
            processed_at: now,
        })
    }
}
