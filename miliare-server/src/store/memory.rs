//! In-memory storage implementations

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use chrono::Utc;
use miliare_core::{
    Company, CompanyId, Error as CoreError, Group, Payment, Principal, PrincipalId, Referral,
    ReferralId,
};
use uuid::Uuid;

use super::{
    Affiliation, DataStore, PaymentFilter, ReferralFilter, Session, SessionId, SessionStore,
    StoreResult,
};
use crate::error::ServerError;

/// In-memory data store
pub struct InMemoryDataStore {
    principals: RwLock<HashMap<PrincipalId, Principal>>,
    companies: RwLock<HashMap<CompanyId, Company>>,
    referrals: RwLock<HashMap<ReferralId, Referral>>,
    payments: RwLock<Vec<Payment>>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self {
            principals: RwLock::new(HashMap::new()),
            companies: RwLock::new(HashMap::new()),
            referrals: RwLock::new(HashMap::new()),
            payments: RwLock::new(Vec::new()),
        }
    }

    /// Check-and-bump under an already held write lock
    fn apply_update(
        referrals: &mut HashMap<ReferralId, Referral>,
        referral: &Referral,
        expected_version: u64,
    ) -> StoreResult<Referral> {
        let stored = referrals
            .get_mut(&referral.id)
            .ok_or_else(|| ServerError::not_found("referral", referral.id.as_str()))?;
        if stored.version != expected_version {
            return Err(CoreError::Conflict {
                kind: "referral",
                id: referral.id.to_string(),
                expected: expected_version,
            }
            .into());
        }
        let mut next = referral.clone();
        next.version = expected_version + 1;
        *stored = next.clone();
        Ok(next)
    }
}

impl Default for InMemoryDataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore for InMemoryDataStore {
    fn create_principal(&self, principal: &Principal) -> StoreResult<()> {
        let mut principals = self.principals.write().unwrap();
        let email = principal.email.to_lowercase();
        if principals.values().any(|p| p.email.to_lowercase() == email) {
            return Err(ServerError::EmailAlreadyExists);
        }
        let mut stored = principal.clone();
        stored.email = email; // Store normalized (lowercase) email
        principals.insert(stored.id.clone(), stored);
        Ok(())
    }

    fn get_principal(&self, id: &PrincipalId) -> StoreResult<Option<Principal>> {
        Ok(self.principals.read().unwrap().get(id).cloned())
    }

    fn get_principal_by_email(&self, email: &str) -> StoreResult<Option<Principal>> {
        let normalized = email.to_lowercase();
        Ok(self
            .principals
            .read()
            .unwrap()
            .values()
            .find(|p| p.email == normalized)
            .cloned())
    }

    fn set_groups(&self, id: &PrincipalId, groups: &BTreeSet<Group>) -> StoreResult<()> {
        let mut principals = self.principals.write().unwrap();
        if let Some(principal) = principals.get_mut(id) {
            principal.groups = groups.clone();
            Ok(())
        } else {
            Err(ServerError::not_found("principal", id.as_str()))
        }
    }

    fn set_affiliation(&self, id: &PrincipalId, affiliation: &Affiliation) -> StoreResult<()> {
        let mut principals = self.principals.write().unwrap();
        let principal = principals
            .get_mut(id)
            .ok_or_else(|| ServerError::not_found("principal", id.as_str()))?;
        principal.company_id = affiliation.company_id.clone();
        principal.team_lead_id = affiliation.team_lead_id.clone();
        principal.org_lead_id = affiliation.org_lead_id.clone();
        Ok(())
    }

    fn create_company(&self, company: &Company) -> StoreResult<()> {
        self.companies
            .write()
            .unwrap()
            .insert(company.id.clone(), company.clone());
        Ok(())
    }

    fn get_company(&self, id: &CompanyId) -> StoreResult<Option<Company>> {
        Ok(self.companies.read().unwrap().get(id).cloned())
    }

    fn list_companies(&self) -> StoreResult<Vec<Company>> {
        let mut companies: Vec<Company> = self.companies.read().unwrap().values().cloned().collect();
        companies.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(companies)
    }

    fn update_company(&self, company: &Company) -> StoreResult<()> {
        let mut companies = self.companies.write().unwrap();
        if let Some(stored) = companies.get_mut(&company.id) {
            *stored = company.clone();
            Ok(())
        } else {
            Err(ServerError::not_found("company", company.id.as_str()))
        }
    }

    fn find_company_by_webhook_hash(&self, hash: &str) -> StoreResult<Option<Company>> {
        Ok(self
            .companies
            .read()
            .unwrap()
            .values()
            .find(|c| c.webhook_secret_hash.as_deref() == Some(hash))
            .cloned())
    }

    fn create_referral(&self, referral: &Referral) -> StoreResult<()> {
        self.referrals
            .write()
            .unwrap()
            .insert(referral.id.clone(), referral.clone());
        Ok(())
    }

    fn get_referral(&self, id: &ReferralId) -> StoreResult<Option<Referral>> {
        Ok(self.referrals.read().unwrap().get(id).cloned())
    }

    fn list_referrals(&self, filter: &ReferralFilter) -> StoreResult<Vec<Referral>> {
        let mut referrals: Vec<Referral> = self
            .referrals
            .read()
            .unwrap()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        // Newest first
        referrals.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(referrals)
    }

    fn update_referral(&self, referral: &Referral, expected_version: u64) -> StoreResult<Referral> {
        let mut referrals = self.referrals.write().unwrap();
        Self::apply_update(&mut referrals, referral, expected_version)
    }

    fn record_payout(
        &self,
        referral: &Referral,
        expected_version: u64,
        payments: &[Payment],
    ) -> StoreResult<Referral> {
        // Lock order: referrals, then payments
        let mut referrals = self.referrals.write().unwrap();
        let mut stored_payments = self.payments.write().unwrap();
        let updated = Self::apply_update(&mut referrals, referral, expected_version)?;
        stored_payments.extend_from_slice(payments);
        Ok(updated)
    }

    fn create_payment(&self, payment: &Payment) -> StoreResult<()> {
        self.payments.write().unwrap().push(payment.clone());
        Ok(())
    }

    fn list_payments(&self, filter: &PaymentFilter) -> StoreResult<Vec<Payment>> {
        Ok(self
            .payments
            .read()
            .unwrap()
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }
}

/// In-memory session store
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, principal_id: &PrincipalId) -> StoreResult<Session> {
        let session = Session {
            id: SessionId(Uuid::new_v4().to_string()),
            principal_id: principal_id.clone(),
            created_at: Utc::now(),
        };
        self.sessions
            .write()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn get(&self, session_id: &SessionId) -> StoreResult<Option<Session>> {
        Ok(self.sessions.read().unwrap().get(session_id).cloned())
    }

    fn delete(&self, session_id: &SessionId) -> StoreResult<()> {
        self.sessions.write().unwrap().remove(session_id);
        Ok(())
    }
}
