//! # Runtime Configuration Module
//!
//! Admission configuration supplied when the dispatcher is activated.
//!
//! ## Overview
//!
//! Requests can race operation registration during startup. The admission
//! configuration decides what happens to a request that finds no route:
//!
//! - `registerOnStart`: path prefixes under which routes are expected to
//!   register shortly
//! - `delayOnNotFoundInSecs`: how long a request under one of those prefixes
//!   is held open waiting for a route before it gets a 404
//!
//! A delay of `0`, or a path outside every prefix, answers 404 immediately.
//!
//! ## Sources
//!
//! The configuration can be deserialized from YAML or JSON (either the
//! camelCase keys above or their snake_case forms), or read from the
//! environment:
//!
//! ### `OAR_REGISTER_ON_START`
//!
//! Comma-separated prefixes, e.g. `/api/v1,/v2`.
//!
//! ### `OAR_DELAY_ON_NOT_FOUND_SECS`
//!
//! Non-negative integer seconds, capped at one year. Default: `0`.
//!
//! ## Example
//!
//! ```yaml
//! registerOnStart:
//!   - /api/v1
//! delayOnNotFoundInSecs: 2
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Longest bounded wait actually applied (one year); larger values are capped
pub const MAX_DELAY_ON_NOT_FOUND_SECS: u64 = 365 * 24 * 60 * 60;

/// Admission control settings, immutable for one activation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Prefixes under which a missing route is worth waiting for
    #[serde(default, alias = "registerOnStart")]
    pub register_on_start: Vec<String>,
    /// Maximum wait for a route to appear, in seconds
    #[serde(default, alias = "delayOnNotFoundInSecs")]
    pub delay_on_not_found_secs: u64,
}

impl AdmissionConfig {
    /// Build a configuration from prefixes and a delay
    pub fn new<I, S>(register_on_start: I, delay_on_not_found_secs: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            register_on_start: register_on_start.into_iter().map(Into::into).collect(),
            delay_on_not_found_secs,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let register_on_start = env::var("OAR_REGISTER_ON_START")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let delay_on_not_found_secs = match env::var("OAR_DELAY_ON_NOT_FOUND_SECS") {
            Ok(val) => val.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: "OAR_DELAY_ON_NOT_FOUND_SECS",
                value: val.clone(),
            })?,
            Err(_) => 0,
        };

        Self {
            register_on_start,
            delay_on_not_found_secs,
        }
        .validated()
    }

    /// Parse a YAML (or JSON) document
    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).context("Failed to parse admission configuration")?;
        Ok(config.validated()?)
    }

    /// Read and parse a YAML (or JSON) file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read admission configuration {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid admission configuration in {}", path.display()))
    }

    /// Check prefixes and normalize trailing slashes
    ///
    /// Every prefix must be absolute. `/api/v1/` becomes `/api/v1`; `/` stays
    /// `/` and covers every path.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        for prefix in &mut self.register_on_start {
            if !prefix.starts_with('/') {
                return Err(ConfigError::RelativePrefix {
                    prefix: prefix.clone(),
                });
            }
            let trimmed = prefix.trim_end_matches('/');
            *prefix = if trimmed.is_empty() {
                "/".to_string()
            } else {
                trimmed.to_string()
            };
        }
        Ok(self)
    }

    /// The bounded wait as a `Duration`
    ///
    /// Capped at [`MAX_DELAY_ON_NOT_FOUND_SECS`] so a deadline computed from
    /// it always fits in an `Instant`.
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_on_not_found_secs.min(MAX_DELAY_ON_NOT_FOUND_SECS))
    }

    /// True if `path` lies under one of the `registerOnStart` prefixes
    ///
    /// A prefix covers the path itself and anything continuing it at a `/`
    /// boundary, so `/abc` covers `/abc/x` but not `/abcd`.
    #[must_use]
    pub fn covers(&self, path: &str) -> bool {
        self.register_on_start.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('/');
            match path.strip_prefix(prefix) {
                Some(rest) => prefix.is_empty() || rest.is_empty() || rest.starts_with('/'),
                None => false,
            }
        })
    }

    /// True if a miss on `path` should be held for the configured delay
    #[must_use]
    pub fn should_wait(&self, path: &str) -> bool {
        self.delay_on_not_found_secs > 0 && self.covers(path)
    }
}
