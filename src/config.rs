// src/config.rs
use thiserror::Error;

const DEV_JWT_SECRET: &str = "development_only_jwt_secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
}

/// S3-compatible bucket settings. R2 is the default target, any endpoint works.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub public_base_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct BillingConfig {
    pub pro_price_id: Option<String>,
    pub enterprise_price_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub openai: Option<OpenAiConfig>,
    pub storage: Option<StorageConfig>,
    pub billing: BillingConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None if cfg!(debug_assertions) => DEV_JWT_SECRET.to_string(),
            None => return Err(ConfigError::Missing("JWT_SECRET")),
        };

        let jwt_expiry_hours = parse_or("JWT_EXPIRY_HOURS", get("JWT_EXPIRY_HOURS"), 24i64)?;
        if jwt_expiry_hours <= 0 {
            return Err(ConfigError::Invalid {
                name: "JWT_EXPIRY_HOURS",
                value: jwt_expiry_hours.to_string(),
            });
        }

        let openai = get("OPENAI_API_KEY").map(|api_key| OpenAiConfig {
            api_key,
            base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
        });

        let storage = match (
            get("R2_BUCKET"),
            get("R2_ACCESS_KEY_ID"),
            get("R2_SECRET_ACCESS_KEY"),
        ) {
            (Some(bucket), Some(access_key_id), Some(secret_access_key)) => {
                let endpoint = match (get("R2_ENDPOINT"), get("R2_ACCOUNT_ID")) {
                    (Some(endpoint), _) => endpoint,
                    (None, Some(account)) => format!("https://{}.r2.cloudflarestorage.com", account),
                    (None, None) => return Err(ConfigError::Missing("R2_ENDPOINT or R2_ACCOUNT_ID")),
                };
                let public_base_url = get("R2_PUBLIC_URL")
                    .unwrap_or_else(|| format!("https://{}.r2.cloudflarestorage.com", bucket))
                    .trim_end_matches('/')
                    .to_string();
                Some(StorageConfig {
                    endpoint,
                    access_key_id,
                    secret_access_key,
                    bucket,
                    public_base_url,
                })
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), 5u32)?,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            jwt_secret,
            jwt_expiry_hours,
            openai,
            storage,
            billing: BillingConfig {
                pro_price_id: get("STRIPE_PRICE_PRO"),
                enterprise_price_id: get("STRIPE_PRICE_ENTERPRISE"),
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn database_url_is_required() {
        let err = config_from(&[("JWT_SECRET", "s")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn defaults_apply_when_optional_values_are_absent() {
        let config = config_from(&[("DATABASE_URL", "postgres://db"), ("JWT_SECRET", "s")]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.jwt_expiry_hours, 24);
        assert!(config.openai.is_none());
        assert!(config.storage.is_none());
    }

    #[test]
    fn storage_endpoint_derives_from_account_id() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://db"),
            ("JWT_SECRET", "s"),
            ("R2_ACCOUNT_ID", "acct"),
            ("R2_ACCESS_KEY_ID", "key"),
            ("R2_SECRET_ACCESS_KEY", "secret"),
            ("R2_BUCKET", "docs"),
        ])
        .unwrap();
        let storage = config.storage.unwrap();
        assert_eq!(storage.endpoint, "https://acct.r2.cloudflarestorage.com");
        assert_eq!(storage.public_base_url, "https://docs.r2.cloudflarestorage.com");
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = config_from(&[
            ("DATABASE_URL", "postgres://db"),
            ("JWT_SECRET", "s"),
            ("DB_MAX_CONNECTIONS", "many"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "DB_MAX_CONNECTIONS", .. }));
    }

    #[test]
    fn openai_base_url_is_normalised() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://db"),
            ("JWT_SECRET", "s"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:8080/v1/"),
        ])
        .unwrap();
        assert_eq!(config.openai.unwrap().base_url, "http://localhost:8080/v1");
    }
}
