//! Identity & group resolution
//!
//! The identity provider is an external collaborator. It either reports the
//! claims behind a session, reports that there is no session, or fails. "No
//! session" is an ordinary outcome and is kept apart from provider failures
//! so that callers do not log it as an error.

use crate::principal::{IdentityClaims, Principal};
use crate::{Error, Result};

/// Opaque failure talking to the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure(pub String);

/// What the identity provider reported for a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLookup {
    Active(IdentityClaims),
    NoSession,
}

/// Boundary to the identity provider
pub trait IdentityProvider: Send + Sync {
    fn lookup(&self, token: &str) -> std::result::Result<SessionLookup, ProviderFailure>;
}

/// Outcome of resolving a request's identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Authenticated(Principal),
    Anonymous,
}

impl Resolution {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Resolution::Authenticated(p) => Some(p),
            Resolution::Anonymous => None,
        }
    }

    /// The principal, or `Unauthenticated`
    pub fn require(self) -> Result<Principal> {
        match self {
            Resolution::Authenticated(p) => Ok(p),
            Resolution::Anonymous => Err(Error::Unauthenticated),
        }
    }
}

/// Resolve an optional session token into a principal snapshot.
///
/// A missing token and a token without a session both resolve to
/// [`Resolution::Anonymous`]. Provider failures surface as
/// [`Error::IdentityUnavailable`].
pub fn resolve<P: IdentityProvider + ?Sized>(provider: &P, token: Option<&str>) -> Result<Resolution> {
    let token = match token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t,
        None => return Ok(Resolution::Anonymous),
    };

    match provider.lookup(token) {
        Ok(SessionLookup::Active(claims)) => Ok(Resolution::Authenticated(Principal::from_claims(&claims))),
        Ok(SessionLookup::NoSession) => Ok(Resolution::Anonymous),
        Err(ProviderFailure(reason)) => Err(Error::IdentityUnavailable(reason)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::principal::Group;

    /// Fixed token table
    #[derive(Default)]
    struct Sessions(HashMap<String, IdentityClaims>);

    impl IdentityProvider for Sessions {
        fn lookup(&self, token: &str) -> std::result::Result<SessionLookup, ProviderFailure> {
            Ok(self
                .0
                .get(token)
                .cloned()
                .map(SessionLookup::Active)
                .unwrap_or(SessionLookup::NoSession))
        }
    }

    fn sessions_with(token: &str, claims: IdentityClaims) -> Sessions {
        Sessions(HashMap::from([(token.to_string(), claims)]))
    }

    struct Unreachable;

    impl IdentityProvider for Unreachable {
        fn lookup(&self, _token: &str) -> std::result::Result<SessionLookup, ProviderFailure> {
            Err(ProviderFailure("connection refused".into()))
        }
    }

    fn claims() -> IdentityClaims {
        IdentityClaims {
            sub: "u-1".into(),
            email: "lead@example.com".into(),
            groups: vec!["teamLead".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_resolves_active_session() {
        let provider = sessions_with("tok", claims());

        let principal = resolve(&provider, Some("tok")).unwrap().require().unwrap();
        assert_eq!(principal.id.as_str(), "u-1");
        assert!(principal.has_group(&Group::TeamLead));
    }

    #[test]
    fn test_missing_or_unknown_token_is_anonymous() {
        let provider = sessions_with("tok", claims());
        assert_eq!(resolve(&provider, None).unwrap(), Resolution::Anonymous);
        assert_eq!(resolve(&provider, Some("  ")).unwrap(), Resolution::Anonymous);
        assert_eq!(resolve(&provider, Some("unknown")).unwrap(), Resolution::Anonymous);
    }

    #[test]
    fn test_anonymous_require_is_unauthenticated() {
        assert!(matches!(Resolution::Anonymous.require(), Err(Error::Unauthenticated)));
    }

    #[test]
    fn test_provider_failure_is_distinct_from_no_session() {
        let result = resolve(&Unreachable, Some("tok"));
        assert!(matches!(result, Err(Error::IdentityUnavailable(_))));
        // No token never reaches the provider
        assert_eq!(resolve(&Unreachable, None).unwrap(), Resolution::Anonymous);
    }

    #[test]
    fn test_token_is_trimmed_before_lookup() {
        let provider = sessions_with("tok", claims());
        assert!(resolve(&provider, Some(" tok ")).unwrap().principal().is_some());
        assert_eq!(resolve(&Sessions::default(), Some("tok")).unwrap(), Resolution::Anonymous);
    }
}
