// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use crate::constants::timeouts;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Upper bound for deletion confirmation, readiness and ensemble scaling
    pub operation_timeout: Duration,
    /// Interval between existence checks for kinds confirmed by polling
    pub deletion_poll_interval: Duration,
    /// Interval between connection state checks of the ensemble admin client
    pub connect_poll_interval: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_millis(timeouts::OPERATION_TIMEOUT_MS),
            deletion_poll_interval: Duration::from_millis(timeouts::DELETION_POLL_INTERVAL_MS),
            connect_poll_interval: Duration::from_millis(timeouts::CONNECT_POLL_INTERVAL_MS),
        }
    }
}

impl OperatorConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(OperatorConfig {
            operation_timeout: millis_from_env("OPERATION_TIMEOUT_MS")?
                .unwrap_or(defaults.operation_timeout),
            deletion_poll_interval: millis_from_env("DELETION_POLL_INTERVAL_MS")?
                .unwrap_or(defaults.deletion_poll_interval),
            connect_poll_interval: millis_from_env("ENSEMBLE_CONNECT_POLL_INTERVAL_MS")?
                .unwrap_or(defaults.connect_poll_interval),
        })
    }
}

fn millis_from_env(key: &str) -> Result<Option<Duration>> {
    match env::var(key) {
        Ok(value) => parse_millis(key, &value).map(Some),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("{} environment variable is not valid unicode", key)),
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    let millis: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a number of milliseconds, got '{}'", key, value))?;
    Ok(Duration::from_millis(millis))
}
