//! Error types for Miliare

use thiserror::Error;

use crate::referral::ReferralStatus;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: ReferralStatus,
        to: ReferralStatus,
    },

    #[error("Company {0} is not active")]
    CompanyInactive(String),

    #[error("Commission amount must be set before a referral is paid")]
    MissingAmount,

    #[error("Referral is not payable (status {status})")]
    NotPayable { status: ReferralStatus },

    #[error("Payment for referral {0} was already processed")]
    PaymentAlreadyProcessed(String),

    #[error("Invalid webhook credentials")]
    Unauthorized,

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Stale write on {kind} {id}: expected version {expected}")]
    Conflict {
        kind: &'static str,
        id: String,
        expected: u64,
    },

    #[error("Invalid compensation structure: {0}")]
    InvalidCompensation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Identity provider unavailable: {0}")]
    IdentityUnavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Error::Forbidden(reason.into())
    }

    /// Short machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            Error::Unauthenticated => "unauthenticated",
            Error::Forbidden(_) => "forbidden",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::CompanyInactive(_) => "company_inactive",
            Error::MissingAmount => "missing_amount",
            Error::NotPayable { .. } => "not_payable",
            Error::PaymentAlreadyProcessed(_) => "already_processed",
            Error::Unauthorized => "unauthorized",
            Error::NotFound { .. } => "not_found",
            Error::Conflict { .. } => "conflict",
            Error::InvalidCompensation(_) => "invalid_compensation",
            Error::Validation(_) => "validation",
            Error::IdentityUnavailable(_) => "identity_unavailable",
            Error::Json(_) => "invalid_json",
        }
    }
}
