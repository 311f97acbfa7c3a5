//! The Auth Adjudicator (spec.md §4.2): evaluates the two credential
//! channels in order and never rejects a request on its own — authorization
//! is left to later stages.

use deployd_core::{AuthErrorKind, Identity};

use crate::jwt::TokenSigner;
use crate::master_key;

pub struct AuthAdjudicator {
    signer: TokenSigner,
    master_key: String,
}

/// The two raw credentials a transport layer may have extracted from a
/// request, kept separate from any particular HTTP framework's header map.
#[derive(Debug, Default)]
pub struct Credentials<'a> {
    pub bearer_token: Option<&'a str>,
    pub master_key: Option<&'a str>,
}

impl AuthAdjudicator {
    pub fn new(signer: TokenSigner, master_key: String) -> Self {
        AuthAdjudicator { signer, master_key }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Returns the resolved identity. A malformed bearer token does not stop
    /// evaluation of the master-key channel; a valid bearer token does not
    /// stop it either — the two channels are independent and a request
    /// bearing both is root regardless of what the token itself carries
    /// (spec.md §8: bearer token + valid master key implies `isRoot = true`).
    /// If both channels fail, the result is the anonymous identity (spec.md §4.2).
    pub fn adjudicate(&self, credentials: Credentials<'_>) -> Identity {
        let mut identity = match credentials.bearer_token.map(|token| self.signer.verify(token)) {
            Some(Ok(identity)) => identity,
            Some(Err(AuthErrorKind::TokenExpired)) => {
                tracing::debug!("bearer token expired");
                Identity::anonymous()
            }
            Some(Err(err)) => {
                tracing::debug!(%err, "bearer token rejected");
                Identity::anonymous()
            }
            None => Identity::anonymous(),
        };

        if let Some(key) = credentials.master_key {
            if master_key::matches(key, &self.master_key) {
                if identity.is_anonymous() {
                    return Identity::root();
                }
                identity.is_root = true;
            }
        }
        identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjudicator() -> AuthAdjudicator {
        AuthAdjudicator::new(
            TokenSigner::new(TokenSigner::generate_secret(), "deployd", chrono::Duration::minutes(5)),
            "top-secret".to_string(),
        )
    }

    #[test]
    fn no_credentials_yields_anonymous() {
        let identity = adjudicator().adjudicate(Credentials::default());
        assert!(identity.is_anonymous());
    }

    #[test]
    fn valid_bearer_token_yields_identity() {
        let adjudicator = adjudicator();
        let token = adjudicator.signer().issue("u1", "alice", false).unwrap();
        let identity = adjudicator.adjudicate(Credentials {
            bearer_token: Some(&token),
            master_key: None,
        });
        assert_eq!(identity.username, "alice");
    }

    #[test]
    fn valid_master_key_yields_root() {
        let identity = adjudicator().adjudicate(Credentials {
            bearer_token: None,
            master_key: Some("top-secret"),
        });
        assert!(identity.is_root);
    }

    #[test]
    fn invalid_bearer_falls_through_to_master_key() {
        let adjudicator = adjudicator();
        let identity = adjudicator.adjudicate(Credentials {
            bearer_token: Some("not-a-jwt"),
            master_key: Some("top-secret"),
        });
        assert!(identity.is_root);
    }

    #[test]
    fn valid_non_root_bearer_token_plus_master_key_is_still_root() {
        let adjudicator = adjudicator();
        let token = adjudicator.signer().issue("u1", "alice", false).unwrap();
        let identity = adjudicator.adjudicate(Credentials {
            bearer_token: Some(&token),
            master_key: Some("top-secret"),
        });
        assert!(identity.is_root);
        assert_eq!(identity.username, "alice");
    }
}
