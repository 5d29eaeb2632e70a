//! Miliare Core Library
//!
//! Business rules for the Miliare referral network:
//! - Principals carry group memberships that gate views and mutations
//! - Referrals move through a forward-only lifecycle toward payout
//! - Paid referrals split their commission pool across roles
//! - Partner systems push status changes through an authenticated webhook

pub mod commission;
pub mod company;
pub mod error;
pub mod identity;
pub mod payment;
pub mod period;
pub mod policy;
pub mod principal;
pub mod referral;
pub mod report;
pub mod webhook;

pub use commission::{CommissionSplit, ShareRole};
pub use company::{Company, CompanyId, CompanyStatus, CompensationStructure, NewCompany};
pub use error::Error;
pub use identity::{IdentityProvider, ProviderFailure, Resolution, SessionLookup};
pub use payment::{ManualPayment, Payment, PaymentId, PaymentType};
pub use period::{PeriodWindow, YearMonth};
pub use policy::{can_access, Requirement, RouteDecision, Section};
pub use principal::{Group, IdentityClaims, Principal, PrincipalId};
pub use referral::{Actor, ClientInfo, PaymentStatus, Referral, ReferralId, ReferralStatus};
pub use report::{CommissionSummary, MonthlyEarnings, Scope};
pub use webhook::AuthorizedCompany;

/// Result type for miliare-core operations
pub type Result<T> = std::result::Result<T, Error>;
