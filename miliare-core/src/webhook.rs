//! Webhook ingestion gate
//!
//! Partner systems authenticate with a per-company shared secret. Only a
//! SHA-256 digest of the secret is stored; presented secrets are hashed and
//! compared in constant time.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::company::{Company, CompanyId};
use crate::referral::Referral;
use crate::{Error, Result};

const SECRET_BYTES: usize = 32;
const SECRET_PREFIX: &str = "mlr_";

/// Proof that a caller presented the correct secret for one company
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedCompany {
    company_id: CompanyId,
}

impl AuthorizedCompany {
    pub fn company_id(&self) -> &CompanyId {
        &self.company_id
    }

    /// Reject referrals owned by any other company
    pub fn check_owns(&self, referral: &Referral) -> Result<()> {
        if referral.company_id == self.company_id {
            Ok(())
        } else {
            Err(Error::forbidden("webhook key is for another company"))
        }
    }
}

/// Hex-encoded SHA-256 of a secret
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Generate a fresh random webhook secret
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", SECRET_PREFIX, URL_SAFE_NO_PAD.encode(bytes))
}

/// Check `presented_secret` against the company's stored digest
pub fn authenticate(company: &Company, presented_secret: &str) -> Result<AuthorizedCompany> {
    let stored = company
        .webhook_secret_hash
        .as_deref()
        .ok_or(Error::Unauthorized)?;
    if presented_secret.is_empty() {
        return Err(Error::Unauthorized);
    }
    let stored = hex::decode(stored).map_err(|_| Error::Unauthorized)?;
    let presented = Sha256::digest(presented_secret.as_bytes());

    if bool::from(presented.as_slice().ct_eq(&stored)) {
        Ok(AuthorizedCompany {
            company_id: company.id.clone(),
        })
    } else {
        Err(Error::Unauthorized)
    }
}
