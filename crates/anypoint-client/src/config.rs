//! Aggregate configuration for the client stack.
//!
//! [`Config`] collects the authorizer, API and cache settings plus the
//! organization scope, and validates the constraints the platform imposes on
//! connected-app credentials. The [`loader`] submodule layers an optional
//! `anypoint.toml` file under `ANYPOINT`-prefixed environment overrides,
//! e.g. `ANYPOINT__AUTH__CLIENT_ID=...` or `ANYPOINT__CACHE__ENTRY_TTL=30s`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::AuthConfig;
use crate::cache::CacheConfig;
use crate::client::ApiConfig;

/// Maximum accepted retry budget.
const MAX_RETRY_ATTEMPTS: u32 = 5;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field value violates its constraint.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// The offending field, in `section.field` form.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The configuration sources could not be read or merged.
    #[error("failed to load configuration: {0}")]
    Load(String),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Root configuration for the client stack.
///
/// # Example (TOML)
///
/// ```toml
/// organization_id = "00000000-0000-4000-8000-000000000000"
/// enable_caching = true
///
/// [auth]
/// client_id = "..."
/// client_secret = "..."
///
/// [api]
/// base_url = "https://anypoint.mulesoft.com"
/// timeout = "30s"
/// retry_attempts = 3
///
/// [cache]
/// entry_ttl = "60s"
/// max_entries = 1000
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Organization id all requests are scoped to (a UUID).
    pub organization_id: String,

    /// Whether GET responses go through the cache layer.
    pub enable_caching: bool,

    /// Credential exchange settings.
    pub auth: AuthConfig,

    /// API client settings.
    pub api: ApiConfig,

    /// Response cache settings.
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            organization_id: String::new(),
            enable_caching: true,
            auth: AuthConfig::default(),
            api: ApiConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for the first constraint
    /// violation found:
    /// - `auth.client_id` must be at least 32 characters
    /// - `auth.client_secret` must be at least 32 characters
    /// - `organization_id` must be at least 36 characters (a UUID)
    /// - `api.retry_attempts` must not exceed 5
    /// - all durations and size bounds must be positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.client_id.len() < 32 {
            return Err(ConfigError::invalid(
                "auth.client_id",
                "must be at least 32 characters",
            ));
        }
        if self.auth.client_secret.len() < 32 {
            return Err(ConfigError::invalid(
                "auth.client_secret",
                "must be at least 32 characters",
            ));
        }
        if self.organization_id.len() < 36 {
            return Err(ConfigError::invalid(
                "organization_id",
                "must be a valid UUID",
            ));
        }
        if self.api.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::invalid(
                "api.retry_attempts",
                format!("must not exceed {MAX_RETRY_ATTEMPTS}"),
            ));
        }
        if self.api.timeout.is_zero() {
            return Err(ConfigError::invalid("api.timeout", "must be positive"));
        }
        if self.cache.entry_ttl.is_zero() {
            return Err(ConfigError::invalid("cache.entry_ttl", "must be positive"));
        }
        if self.cache.cleanup_interval.is_zero() {
            return Err(ConfigError::invalid(
                "cache.cleanup_interval",
                "must be positive",
            ));
        }
        if self.cache.max_size == 0 {
            return Err(ConfigError::invalid("cache.max_size", "must be positive"));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::invalid(
                "cache.max_entries",
                "must be positive",
            ));
        }
        Ok(())
    }
}

pub mod loader {
    use super::{Config as AppConfig, ConfigError};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Loads configuration from an optional TOML file plus environment
    /// overrides, then validates the result.
    ///
    /// With no explicit path, a root-level `anypoint.toml` is used when it
    /// exists. Environment variables use the `ANYPOINT` prefix with `__` as
    /// the section separator, e.g. `ANYPOINT__API__RETRY_ATTEMPTS=2`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when sources cannot be read or merged,
    /// or [`ConfigError::InvalidValue`] when validation fails.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                let default_path = PathBuf::from("anypoint.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        builder = builder.add_source(
            Environment::with_prefix("ANYPOINT")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        merged.validate()?;
        Ok(merged)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.auth.client_id = "a".repeat(32);
        config.auth.client_secret = "b".repeat(32);
        config.organization_id = "00000000-0000-4000-8000-000000000000".to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.enable_caching);
        assert!(config.organization_id.is_empty());
        assert_eq!(config.api.retry_attempts, 3);
        assert_eq!(config.cache.max_entries, 1000);
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_short_client_id_rejected() {
        let mut config = valid_config();
        config.auth.client_id = "short".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("auth.client_id"));
    }

    #[test]
    fn test_short_client_secret_rejected() {
        let mut config = valid_config();
        config.auth.client_secret = "short".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("auth.client_secret"));
    }

    #[test]
    fn test_short_organization_id_rejected() {
        let mut config = valid_config();
        config.organization_id = "not-a-uuid".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("organization_id"));
    }

    #[test]
    fn test_excessive_retry_attempts_rejected() {
        let mut config = valid_config();
        config.api.retry_attempts = 6;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("api.retry_attempts"));
    }

    #[test]
    fn test_zero_durations_rejected() {
        let mut config = valid_config();
        config.api.timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.cache.entry_ttl = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.cache.cleanup_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_bounds_rejected() {
        let mut config = valid_config();
        config.cache.max_size = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.cache.max_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = valid_config();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();

        assert_eq!(parsed.organization_id, config.organization_id);
        assert_eq!(parsed.api.retry_attempts, config.api.retry_attempts);
        assert_eq!(parsed.cache.entry_ttl, config.cache.entry_ttl);
    }
}
