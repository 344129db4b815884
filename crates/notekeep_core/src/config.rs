//! Core configuration.
//!
//! # Responsibility
//! - Hold tunables for slug allocation, lifecycle defaults and storage bounds.
//! - Load overrides from `NOTEKEEP_*` environment variables or JSON.
//!
//! # Invariants
//! - A config returned by `from_env`/`from_json_str` has passed `validate()`.

use crate::slug::MIN_SLUG_MAX_LEN;
use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const ENV_SLUG_MIN_LEN: &str = "NOTEKEEP_SLUG_MIN_LEN";
const ENV_SLUG_MAX_LEN: &str = "NOTEKEEP_SLUG_MAX_LEN";
const ENV_SLUG_PROBE_ATTEMPTS: &str = "NOTEKEEP_SLUG_PROBE_ATTEMPTS";
const ENV_CREATE_ATTEMPTS: &str = "NOTEKEEP_CREATE_ATTEMPTS";
const ENV_PURGE_AFTER_DAYS: &str = "NOTEKEEP_PURGE_AFTER_DAYS";
const ENV_BUSY_TIMEOUT_MS: &str = "NOTEKEEP_BUSY_TIMEOUT_MS";
const ENV_OPERATION_TIMEOUT_MS: &str = "NOTEKEEP_OPERATION_TIMEOUT_MS";

/// Configuration loading/validation error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to parse config json: {0}")]
    Json(String),
}

/// Length bounds applied by the slug generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlugRules {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for SlugRules {
    fn default() -> Self {
        Self {
            min_len: 3,
            max_len: 50,
        }
    }
}

/// Settings shared by the store bootstrap and the lifecycle orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub slug: SlugRules,
    /// Total probes (`base`, `base-1`, ...) before the random fallback.
    pub slug_probe_attempts: u32,
    /// Create attempts when the unique index reports a slug conflict.
    pub create_attempts: u32,
    /// Purge delay used when soft-delete callers do not pass one.
    pub default_purge_after_days: u32,
    /// How long a statement waits on a locked database.
    pub busy_timeout_ms: u64,
    /// Upper bound for one orchestrated operation; `None` disables it.
    pub operation_timeout_ms: Option<u64>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            slug: SlugRules::default(),
            slug_probe_attempts: 100,
            create_attempts: 3,
            default_purge_after_days: 7,
            busy_timeout_ms: 5_000,
            operation_timeout_ms: Some(30_000),
        }
    }
}

impl CoreConfig {
    /// Builds config from defaults plus `NOTEKEEP_*` environment overrides.
    ///
    /// Reads:
    /// - `NOTEKEEP_SLUG_MIN_LEN`, `NOTEKEEP_SLUG_MAX_LEN`
    /// - `NOTEKEEP_SLUG_PROBE_ATTEMPTS`, `NOTEKEEP_CREATE_ATTEMPTS`
    /// - `NOTEKEEP_PURGE_AFTER_DAYS`
    /// - `NOTEKEEP_BUSY_TIMEOUT_MS`
    /// - `NOTEKEEP_OPERATION_TIMEOUT_MS` (`0` disables the bound)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parses a JSON document; missing fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Json(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = parse_var(&lookup, ENV_SLUG_MIN_LEN)? {
            config.slug.min_len = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_SLUG_MAX_LEN)? {
            config.slug.max_len = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_SLUG_PROBE_ATTEMPTS)? {
            config.slug_probe_attempts = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_CREATE_ATTEMPTS)? {
            config.create_attempts = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_PURGE_AFTER_DAYS)? {
            config.default_purge_after_days = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_BUSY_TIMEOUT_MS)? {
            config.busy_timeout_ms = value;
        }
        if let Some(value) = parse_var::<u64>(&lookup, ENV_OPERATION_TIMEOUT_MS)? {
            config.operation_timeout_ms = (value > 0).then_some(value);
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slug.min_len == 0 {
            return Err(ConfigError::Invalid(
                "slug.min_len must be at least 1".to_string(),
            ));
        }
        if self.slug.min_len > self.slug.max_len {
            return Err(ConfigError::Invalid(format!(
                "slug.min_len ({}) exceeds slug.max_len ({})",
                self.slug.min_len, self.slug.max_len
            )));
        }
        if self.slug.max_len < MIN_SLUG_MAX_LEN {
            return Err(ConfigError::Invalid(format!(
                "slug.max_len ({}) must be at least {MIN_SLUG_MAX_LEN} to fit random fallbacks",
                self.slug.max_len
            )));
        }
        if self.slug_probe_attempts == 0 {
            return Err(ConfigError::Invalid(
                "slug_probe_attempts must be at least 1".to_string(),
            ));
        }
        if self.create_attempts == 0 {
            return Err(ConfigError::Invalid(
                "create_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default_purge_after(&self) -> ChronoDuration {
        ChronoDuration::days(i64::from(self.default_purge_after_days))
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&'static str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
        })
}
