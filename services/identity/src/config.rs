//! Centralized configuration for the identity service.
//!
//! All configuration is loaded from environment variables and validated
//! at startup.

use crate::error::IdentityError;
use crate::observability::{LogFormat, TracingConfig};
use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Identity service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Key encryption
    /// Secret the key-encryption key is derived from
    pub enc_password: SecretString,
    /// Salt for key derivation
    pub enc_salt: String,

    // Key lifecycle
    /// Interval between scheduled rotations
    pub key_rotation_interval: Duration,
    /// Interval between purges of retired keys; disabled when `None`
    pub key_purge_interval: Option<Duration>,

    // Seeding
    /// Seed RBAC data on first start
    pub init_enabled: bool,
    /// JSON seed document
    pub init_seed_path: Option<PathBuf>,

    // Observability
    /// Log filter
    pub log_level: String,
    /// JSON log output
    pub log_json: bool,

    /// Grace period for background tasks on shutdown
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables, reading `.env` first.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, IdentityError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IdentityError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let enc_password = SecretString::from(required(&lookup, "ENC_PASSWORD")?);
        let enc_salt = required(&lookup, "ENC_SALT")?;

        let key_rotation_interval =
            Duration::from_secs(parse_var(&lookup, "KEY_ROTATION_INTERVAL", 86_400)?);
        let key_purge_interval = match lookup("KEY_PURGE_INTERVAL") {
            Some(raw) if !raw.trim().is_empty() => Some(Duration::from_secs(
                raw.trim()
                    .parse()
                    .map_err(|e| IdentityError::config(format!("Invalid KEY_PURGE_INTERVAL: {e}")))?,
            )),
            _ => None,
        };

        let init_enabled = parse_var(&lookup, "INIT_ENABLED", false)?;
        let init_seed_path = lookup("INIT_SEED_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_json = parse_var(&lookup, "LOG_JSON", false)?;
        let shutdown_timeout = Duration::from_secs(parse_var(&lookup, "SHUTDOWN_TIMEOUT", 10)?);

        let config = Self {
            enc_password,
            enc_salt,
            key_rotation_interval,
            key_purge_interval,
            init_enabled,
            init_seed_path,
            log_level,
            log_json,
            shutdown_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), IdentityError> {
        if self.enc_password.expose_secret().is_empty() {
            return Err(IdentityError::config("ENC_PASSWORD must not be empty"));
        }
        if self.key_rotation_interval.is_zero() {
            return Err(IdentityError::config("KEY_ROTATION_INTERVAL must be positive"));
        }
        if self.key_purge_interval.is_some_and(|d| d.is_zero()) {
            return Err(IdentityError::config("KEY_PURGE_INTERVAL must be positive"));
        }
        if self.init_enabled && self.init_seed_path.is_none() {
            return Err(IdentityError::config("INIT_SEED_PATH is required when INIT_ENABLED is set"));
        }
        Ok(())
    }

    /// Tracing settings derived from this configuration.
    #[must_use]
    pub fn tracing(&self) -> TracingConfig {
        TracingConfig::default()
            .with_log_level(&self.log_level)
            .with_format(LogFormat::from_json_flag(self.log_json))
    }
}

fn required<F>(lookup: &F, name: &str) -> Result<String, IdentityError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).ok_or_else(|| IdentityError::config(format!("{name} is required")))
}

/// Parse a variable with a default value.
fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, IdentityError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|e| IdentityError::config(format!("Invalid {name}: {e}"))),
        None => Ok(default),
    }
}
