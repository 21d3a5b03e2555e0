use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Secrets that ship in examples and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["", "changeme", "change-me", "dev-secret-change-me", "secret"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DIVESITE_JWT_SECRET must be set to a real secret")]
    MissingSecret,
    #[error("{name} is not valid: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub token_ttl_days: i64,
    pub geocoding_url: Option<String>,
    pub geocoding_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = var("DIVESITE_JWT_SECRET").unwrap_or_default();
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.trim()) {
            return Err(ConfigError::MissingSecret);
        }

        let db_path = var("DIVESITE_DB_PATH").unwrap_or_else(|| "divesite.db".into());
        let host = var("DIVESITE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = var("DIVESITE_PORT").unwrap_or_else(|| "8000".into());

        let addr_text = format!("{}:{}", host, port);
        let addr = addr_text.parse().map_err(|_| ConfigError::Invalid {
            name: "DIVESITE_HOST/DIVESITE_PORT",
            value: addr_text.clone(),
        })?;

        let token_ttl_days = match var("DIVESITE_TOKEN_TTL_DAYS") {
            Some(raw) => raw
                .parse()
                .ok()
                .filter(|days: &i64| *days > 0)
                .ok_or(ConfigError::Invalid {
                    name: "DIVESITE_TOKEN_TTL_DAYS",
                    value: raw,
                })?,
            None => 30,
        };

        Ok(Self {
            jwt_secret,
            db_path: PathBuf::from(db_path),
            addr,
            token_ttl_days,
            geocoding_url: var("DIVESITE_GEOCODING_URL").filter(|u| !u.is_empty()),
            geocoding_key: var("DIVESITE_GEOCODING_KEY").filter(|k| !k.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("DIVESITE_JWT_SECRET", "s3cr3t-for-tests")]).unwrap();
        assert_eq!(config.addr, "0.0.0.0:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.db_path, PathBuf::from("divesite.db"));
        assert_eq!(config.token_ttl_days, 30);
        assert!(config.geocoding_url.is_none());
    }

    #[test]
    fn placeholder_secrets_are_refused() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingSecret)));
        assert!(matches!(
            load(&[("DIVESITE_JWT_SECRET", "dev-secret-change-me")]),
            Err(ConfigError::MissingSecret)
        ));
    }

    #[test]
    fn bad_values_are_reported() {
        let err = load(&[("DIVESITE_JWT_SECRET", "x1y2z3"), ("DIVESITE_PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = load(&[("DIVESITE_JWT_SECRET", "x1y2z3"), ("DIVESITE_TOKEN_TTL_DAYS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "DIVESITE_TOKEN_TTL_DAYS", .. }));
    }
}
