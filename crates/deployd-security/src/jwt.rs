//! Bearer-token issuance and verification (spec.md §4.2, channel 1).

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;

use deployd_core::{AuthErrorKind, Identity, TokenClaims};

/// Signs and verifies bearer tokens with a process-wide HMAC-SHA256 secret.
/// The secret is generated once, on first use, and held for the life of the
/// process (spec.md §4.2 "Token generation").
pub struct TokenSigner {
    secret: Vec<u8>,
    issuer: String,
    ttl: chrono::Duration,
}

impl TokenSigner {
    pub fn new(secret: Vec<u8>, issuer: impl Into<String>, ttl: chrono::Duration) -> Self {
        TokenSigner {
            secret,
            issuer: issuer.into(),
            ttl,
        }
    }

    /// Generates a fresh 32-byte random signing secret — spec.md §4.2.
    pub fn generate_secret() -> Vec<u8> {
        let mut bytes = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }

    /// Generates a 16-random-byte, base64url-encoded token id — spec.md §4.2.
    fn generate_token_id() -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
    }

    pub fn issue(&self, user_id: &str, username: &str, is_root: bool) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now();
        let claims = TokenClaims {
            user_id: user_id.to_string(),
            username: username.to_string(),
            is_root,
            issued_at: now.timestamp(),
            not_before: now.timestamp(),
            expires_at: (now + self.ttl).timestamp(),
            token_id: Self::generate_token_id(),
            issuer: self.issuer.clone(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
    }

    /// Verifies signature and algorithm, then checks expiry explicitly so
    /// `token-expired` can be distinguished from other invalid-token faults
    /// (spec.md §4.2).
    pub fn verify(&self, token: &str) -> Result<Identity, AuthErrorKind> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        // Expiry is checked by hand below so we can report it distinctly.
        validation.validate_exp = false;

        let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map_err(|err| AuthErrorKind::InvalidToken(err.to_string()))?;

        if data.claims.expires_at < chrono::Utc::now().timestamp() {
            return Err(AuthErrorKind::TokenExpired);
        }

        Ok(Identity::from(&data.claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new(
            TokenSigner::generate_secret(),
            "deployd",
            chrono::Duration::minutes(5),
        )
    }

    #[test]
    fn round_trips_identity() {
        let signer = signer();
        let token = signer.issue("u1", "alice", false).unwrap();
        let identity = signer.verify(&token).unwrap();
        assert_eq!(identity.user_id, "u1");
        assert_eq!(identity.username, "alice");
        assert!(!identity.is_root);
        assert!(identity.is_authenticated);
    }

    #[test]
    fn rejects_signature_from_a_different_secret() {
        let signer_a = signer();
        let signer_b = signer();
        let token = signer_a.issue("u1", "alice", false).unwrap();
        assert!(matches!(
            signer_b.verify(&token),
            Err(AuthErrorKind::InvalidToken(_))
        ));
    }

    #[test]
    fn reports_expiry_distinctly() {
        let signer = TokenSigner::new(TokenSigner::generate_secret(), "deployd", chrono::Duration::seconds(-1));
        let token = signer.issue("u1", "alice", false).unwrap();
        assert!(matches!(signer.verify(&token), Err(AuthErrorKind::TokenExpired)));
    }
}
