//! The identity record produced by the Auth Adjudicator and carried,
//! read-only, into every hook invocation (spec.md §3 "Identity").

use serde::{Deserialize, Serialize};

/// `{userId, username, isRoot, isAuthenticated}` — spec.md §3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    pub is_root: bool,
    pub is_authenticated: bool,
}

impl Identity {
    pub fn anonymous() -> Identity {
        Identity {
            user_id: String::new(),
            username: String::new(),
            is_root: false,
            is_authenticated: false,
        }
    }

    pub fn root() -> Identity {
        Identity {
            user_id: "root".to_string(),
            username: "root".to_string(),
            is_root: true,
            is_authenticated: true,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        !self.is_authenticated
    }
}

impl Default for Identity {
    fn default() -> Self {
        Identity::anonymous()
    }
}

/// Signed bearer-token claims — spec.md §3 "Token claims".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "sub")]
    pub user_id: String,
    pub username: String,
    #[serde(rename = "isRoot", default)]
    pub is_root: bool,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "nbf")]
    pub not_before: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
    #[serde(rename = "jti")]
    pub token_id: String,
    #[serde(rename = "iss")]
    pub issuer: String,
}

impl From<&TokenClaims> for Identity {
    fn from(claims: &TokenClaims) -> Self {
        Identity {
            user_id: claims.user_id.clone(),
            username: claims.username.clone(),
            is_root: claims.is_root,
            is_authenticated: true,
        }
    }
}
