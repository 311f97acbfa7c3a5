//! The top-level security config file (spec.md §6 "Persisted state layout":
//! "a top-level security config file holds the master key, token-signing
//! secret, token lifetime, and registration policy — permissioned to owner
//! read/write only (numerically: 0600)").

use std::path::Path;

use serde::{Deserialize, Serialize};

use deployd_security::TokenSigner;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub master_key: String,
    #[serde(with = "hex_bytes")]
    pub token_secret: Vec<u8>,
    pub token_lifetime_secs: i64,
    pub allow_registration: bool,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

impl SecurityConfig {
    /// Generates a fresh signing secret — called once, when no security
    /// config file exists yet (spec.md §4.2 "Token generation").
    pub fn generate(master_key: String, token_lifetime_secs: i64, allow_registration: bool) -> SecurityConfig {
        SecurityConfig {
            master_key,
            token_secret: TokenSigner::generate_secret(),
            token_lifetime_secs,
            allow_registration,
        }
    }

    /// Loads the security config file if it exists, or generates and
    /// persists a fresh one otherwise, at owner-only permissions.
    pub fn load_or_create(
        path: &Path,
        master_key: String,
        token_lifetime_secs: i64,
        allow_registration: bool,
    ) -> std::io::Result<SecurityConfig> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: SecurityConfig = serde_json::from_str(&content)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            return Ok(config);
        }
        let config = SecurityConfig::generate(master_key, token_lifetime_secs, allow_registration);
        config.save(path)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        restrict_to_owner(path)?;
        Ok(())
    }

    pub fn signer(&self, issuer: impl Into<String>) -> TokenSigner {
        TokenSigner::new(
            self.token_secret.clone(),
            issuer,
            chrono::Duration::seconds(self.token_lifetime_secs),
        )
    }
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_then_reloads_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security.json");

        let created = SecurityConfig::load_or_create(&path, "top-secret".to_string(), 3600, false).unwrap();
        let reloaded = SecurityConfig::load_or_create(&path, "different".to_string(), 60, true).unwrap();

        assert_eq!(created.token_secret, reloaded.token_secret);
        assert_eq!(reloaded.master_key, "top-secret");
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security.json");
        SecurityConfig::load_or_create(&path, "top-secret".to_string(), 3600, false).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
