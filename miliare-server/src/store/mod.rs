//! Storage abstractions for the server

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::{InMemoryDataStore, InMemorySessionStore};
pub use models::*;
pub use sqlite::SqliteStore;

use std::collections::BTreeSet;
use std::sync::Arc;

use miliare_core::{
    Company, CompanyId, Group, Payment, Principal, PrincipalId, Referral, ReferralId,
};

use crate::error::ServerError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, ServerError>;

/// Trait for the managed data store: principals, companies, referrals, payments
pub trait DataStore: Send + Sync {
    /// Create a principal; emails are unique (case-insensitive)
    fn create_principal(&self, principal: &Principal) -> StoreResult<()>;

    /// Get a principal by ID
    fn get_principal(&self, id: &PrincipalId) -> StoreResult<Option<Principal>>;

    /// Get a principal by email address
    fn get_principal_by_email(&self, email: &str) -> StoreResult<Option<Principal>>;

    /// Replace a principal's group memberships
    fn set_groups(&self, id: &PrincipalId, groups: &BTreeSet<Group>) -> StoreResult<()>;

    /// Replace a principal's company and upline
    fn set_affiliation(&self, id: &PrincipalId, affiliation: &Affiliation) -> StoreResult<()>;

    fn create_company(&self, company: &Company) -> StoreResult<()>;

    fn get_company(&self, id: &CompanyId) -> StoreResult<Option<Company>>;

    fn list_companies(&self) -> StoreResult<Vec<Company>>;

    /// Overwrite a company's mutable fields (status, profile, webhook hash)
    fn update_company(&self, company: &Company) -> StoreResult<()>;

    /// Find the company whose stored webhook digest equals `hash`
    fn find_company_by_webhook_hash(&self, hash: &str) -> StoreResult<Option<Company>>;

    fn create_referral(&self, referral: &Referral) -> StoreResult<()>;

    fn get_referral(&self, id: &ReferralId) -> StoreResult<Option<Referral>>;

    fn list_referrals(&self, filter: &ReferralFilter) -> StoreResult<Vec<Referral>>;

    /// Write `referral` only if the stored version is still `expected_version`.
    ///
    /// Returns the stored referral with its bumped version, or
    /// `Conflict` when another write got there first.
    fn update_referral(&self, referral: &Referral, expected_version: u64) -> StoreResult<Referral>;

    /// Conditional referral write plus payment inserts, as one unit
    fn record_payout(
        &self,
        referral: &Referral,
        expected_version: u64,
        payments: &[Payment],
    ) -> StoreResult<Referral>;

    /// Insert a payment not tied to a referral write
    fn create_payment(&self, payment: &Payment) -> StoreResult<()>;

    fn list_payments(&self, filter: &PaymentFilter) -> StoreResult<Vec<Payment>>;
}

/// Trait for session storage
pub trait SessionStore: Send + Sync {
    /// Create a new session for a principal
    fn create(&self, principal_id: &PrincipalId) -> StoreResult<Session>;

    /// Get a session by ID
    fn get(&self, session_id: &SessionId) -> StoreResult<Option<Session>>;

    /// Delete a session
    fn delete(&self, session_id: &SessionId) -> StoreResult<()>;
}

// One shared store can back both traits
impl<T: DataStore + ?Sized> DataStore for Arc<T> {
    fn create_principal(&self, principal: &Principal) -> StoreResult<()> {
        (**self).create_principal(principal)
    }

    fn get_principal(&self, id: &PrincipalId) -> StoreResult<Option<Principal>> {
        (**self).get_principal(id)
    }

    fn get_principal_by_email(&self, email: &str) -> StoreResult<Option<Principal>> {
        (**self).get_principal_by_email(email)
    }

    fn set_groups(&self, id: &PrincipalId, groups: &BTreeSet<Group>) -> StoreResult<()> {
        (**self).set_groups(id, groups)
    }

    fn set_affiliation(&self, id: &PrincipalId, affiliation: &Affiliation) -> StoreResult<()> {
        (**self).set_affiliation(id, affiliation)
    }

    fn create_company(&self, company: &Company) -> StoreResult<()> {
        (**self).create_company(company)
    }

    fn get_company(&self, id: &CompanyId) -> StoreResult<Option<Company>> {
        (**self).get_company(id)
    }

    fn list_companies(&self) -> StoreResult<Vec<Company>> {
        (**self).list_companies()
    }

    fn update_company(&self, company: &Company) -> StoreResult<()> {
        (**self).update_company(company)
    }

    fn find_company_by_webhook_hash(&self, hash: &str) -> StoreResult<Option<Company>> {
        (**self).find_company_by_webhook_hash(hash)
    }

    fn create_referral(&self, referral: &Referral) -> StoreResult<()> {
        (**self).create_referral(referral)
    }

    fn get_referral(&self, id: &ReferralId) -> StoreResult<Option<Referral>> {
        (**self).get_referral(id)
    }

    fn list_referrals(&self, filter: &ReferralFilter) -> StoreResult<Vec<Referral>> {
        (**self).list_referrals(filter)
    }

    fn update_referral(&self, referral: &Referral, expected_version: u64) -> StoreResult<Referral> {
        (**self).update_referral(referral, expected_version)
    }

    fn record_payout(
        &self,
        referral: &Referral,
        expected_version: u64,
        payments: &[Payment],
    ) -> StoreResult<Referral> {
        (**self).record_payout(referral, expected_version, payments)
    }

    fn create_payment(&self, payment: &Payment) -> StoreResult<()> {
        (**self).create_payment(payment)
    }

    fn list_payments(&self, filter: &PaymentFilter) -> StoreResult<Vec<Payment>> {
        (**self).list_payments(filter)
    }
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn create(&self, principal_id: &PrincipalId) -> StoreResult<Session> {
        (**self).create(principal_id)
    }

    fn get(&self, session_id: &SessionId) -> StoreResult<Option<Session>> {
        (**self).get(session_id)
    }

    fn delete(&self, session_id: &SessionId) -> StoreResult<()> {
        (**self).delete(session_id)
    }
}
