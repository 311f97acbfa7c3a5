//! Configuration loading (spec.md §6 "Configuration"), grounded on
//! `r2e-core::config`'s resolution order: base YAML file, then `.env`
//! (never overwriting an already-set environment variable), then a process
//! environment overlay, each layer's keys taking priority over the last.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug)]
pub enum ConfigError {
    Load(String),
    MissingKey(&'static str),
    InvalidValue { key: &'static str, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Load(msg) => write!(f, "config load error: {msg}"),
            ConfigError::MissingKey(key) => write!(f, "missing required config key: {key}"),
            ConfigError::InvalidValue { key, message } => {
                write!(f, "invalid value for {key}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DbType {
    EmbeddedSql,
    NetworkedSql,
    DocumentStore,
}

/// The recognized configuration keys of spec.md §6, resolved from
/// `application.yaml`, environment variables (`DEPLOYD_` prefixed, dotted
/// keys upper-snake-cased), and an optional `.env` file, in that priority
/// order (lowest to highest).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_type: DbType,
    pub db_host: Option<String>,
    pub db_port: Option<u16>,
    pub db_user: Option<String>,
    pub db_pass: Option<String>,
    pub db_name: Option<String>,
    pub port: u16,
    pub dev: bool,
    pub master_key: String,
    pub jwt_secret: Option<String>,
    pub jwt_expiration: Duration,
    pub allow_registration: bool,
    pub require_verification: bool,
    pub resources_dir: String,
}

fn env_overlay(values: &mut HashMap<String, String>) {
    for (key, value) in std::env::vars() {
        let Some(rest) = key.strip_prefix("DEPLOYD_") else {
            continue;
        };
        values.insert(rest.to_lowercase(), value);
    }
}

fn load_yaml(path: &Path, values: &mut HashMap<String, String>) -> Result<(), ConfigError> {
    if !path.exists() {
        return Ok(());
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Load(e.to_string()))?;
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Load(e.to_string()))?;
    let serde_yaml::Value::Mapping(map) = yaml else {
        return Ok(());
    };
    for (k, v) in map {
        let serde_yaml::Value::String(key) = k else {
            continue;
        };
        let value = match v {
            serde_yaml::Value::String(s) => s,
            other => serde_yaml::to_string(&other).unwrap_or_default().trim().to_string(),
        };
        values.insert(key, value);
    }
    Ok(())
}

impl AppConfig {
    /// Loads `application.yaml` from the current directory, overlays an
    /// optional `.env` file (via `dotenvy`, which never clobbers an
    /// already-set process environment variable), then overlays
    /// `DEPLOYD_*` environment variables, which win over everything else.
    pub fn load() -> Result<AppConfig, ConfigError> {
        Self::load_from(Path::new("application.yaml"))
    }

    pub fn load_from(yaml_path: &Path) -> Result<AppConfig, ConfigError> {
        let mut values = HashMap::new();
        load_yaml(yaml_path, &mut values)?;

        let _ = dotenvy::dotenv();
        env_overlay(&mut values);

        let db_type = match values.get("dbtype").map(String::as_str) {
            Some("embedded-sql") | None => DbType::EmbeddedSql,
            Some("networked-sql") => DbType::NetworkedSql,
            Some("document-store") => DbType::DocumentStore,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "dbType",
                    message: format!("unrecognized dbType {other:?}"),
                })
            }
        };

        let port = values
            .get("port")
            .map(|v| v.parse::<u16>())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue { key: "port", message: e.to_string() })?
            .unwrap_or(2403);

        let dev = values.get("dev").map(|v| v == "true" || v == "1").unwrap_or(false);

        let master_key = values
            .get("masterkey")
            .cloned()
            .ok_or(ConfigError::MissingKey("masterKey"))?;

        let jwt_expiration = match values.get("jwtexpiration") {
            Some(raw) => humantime::parse_duration(raw).map_err(|e| ConfigError::InvalidValue {
                key: "jwtExpiration",
                message: e.to_string(),
            })?,
            None => Duration::from_secs(24 * 60 * 60),
        };

        let db_port = values
            .get("dbport")
            .map(|v| v.parse::<u16>())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue { key: "dbPort", message: e.to_string() })?;

        Ok(AppConfig {
            db_type,
            db_host: values.get("dbhost").cloned(),
            db_port,
            db_user: values.get("dbuser").cloned(),
            db_pass: values.get("dbpass").cloned(),
            db_name: values.get("dbname").cloned(),
            port,
            dev,
            master_key,
            jwt_secret: values.get("jwtsecret").cloned(),
            jwt_expiration,
            allow_registration: values.get("allowregistration").map(|v| v == "true").unwrap_or(false),
            require_verification: values.get("requireverification").map(|v| v == "true").unwrap_or(false),
            resources_dir: values.get("resourcesdir").cloned().unwrap_or_else(|| "resources".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_master_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.yaml");
        std::fs::write(&path, "port: 3000\n").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::MissingKey("masterKey"))));
    }

    #[test]
    fn parses_recognized_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "masterKey: top-secret").unwrap();
        writeln!(file, "port: 4000").unwrap();
        writeln!(file, "jwtExpiration: 1h").unwrap();
        writeln!(file, "dev: true").unwrap();
        drop(file);

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.master_key, "top-secret");
        assert_eq!(config.port, 4000);
        assert_eq!(config.jwt_expiration, Duration::from_secs(3600));
        assert!(config.dev);
    }
}
