// Copyright 2025-Present Levo.ai, Inc. https://levo.ai/
// SPDX-License-Identifier: Apache-2.0

use std::env;

use reqwest::Url;
use thiserror::Error;
use tracing::warn;

/// Default sampling rate: capture every transaction.
const DEFAULT_SAMPLING_RATE: f64 = 1.0;
/// Bodies above this many KiB are replaced with a sentinel, never stored raw.
const DEFAULT_SIZE_THRESHOLD_KB: usize = 1024;
/// Per-attempt timeout covering both connect and read phases, in seconds.
const DEFAULT_TIMEOUT_SECONDS: u64 = 3;
/// Total delivery attempts per trace before the record is dropped.
const DEFAULT_MAX_RETRIES: u32 = 3;

fn default_exclude_paths() -> Vec<String> {
    vec![
        "/assets/".to_string(),
        "/packs/".to_string(),
        "/health".to_string(),
    ]
}

fn default_filter_fields() -> Vec<String> {
    vec![
        "password".to_string(),
        "token".to_string(),
        "api_key".to_string(),
        "secret".to_string(),
    ]
}

/// Errors raised while constructing or validating a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No collector URL was provided; the sensor cannot deliver anything.
    #[error("collector URL is not set (LEVO_COLLECTOR_URL)")]
    MissingCollectorUrl,
    /// The collector URL failed to parse as an absolute HTTP(S) URL.
    #[error("invalid collector URL {url:?}: {reason}")]
    InvalidCollectorUrl { url: String, reason: String },
}

/// Static sensor configuration.
///
/// Built once at startup (programmatically or via [`Config::from_env`]) and
/// shared read-only across all capture and delivery units. There is no
/// ambient global: every component receives the configuration it needs at
/// construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Master switch. When false the sensor is a pass-through no-op.
    pub enabled: bool,
    /// Base URL of the Levo collector, e.g. `https://collector.levo.ai`.
    pub collector_url: String,
    /// Probability in [0.0, 1.0] that a given transaction is captured.
    pub sampling_rate: f64,
    /// Path prefixes that are never captured.
    pub exclude_paths: Vec<String>,
    /// Field names whose values are masked in captured bodies.
    pub filter_fields: Vec<String>,
    /// Bodies larger than this many KiB are replaced with a sentinel.
    pub size_threshold_kb: usize,
    /// Per-attempt delivery timeout, in seconds.
    pub timeout_seconds: u64,
    /// Total delivery attempts per trace.
    pub max_retries: u32,
    /// Organization identifier forwarded as `x-levo-organization-id`.
    pub organization_id: Option<String>,
    /// Deployment environment name reported in the resource block.
    pub environment: String,
    /// Service name reported in the resource block.
    pub service_name: String,
    /// Host name reported in the resource block.
    pub host_name: String,
}

impl Config {
    /// Creates a configuration pointing at the given collector, with the
    /// stock defaults for everything else.
    pub fn new(collector_url: impl Into<String>) -> Self {
        Config {
            collector_url: collector_url.into(),
            ..Config::default()
        }
    }

    /// Builds a configuration from `LEVO_*` environment variables.
    ///
    /// Only the collector URL is required; every other variable falls back
    /// to its default. Malformed numeric values are ignored with a warning
    /// rather than failing startup.
    pub fn from_env() -> Result<Config, ConfigError> {
        let collector_url =
            env::var("LEVO_COLLECTOR_URL").map_err(|_| ConfigError::MissingCollectorUrl)?;

        let enabled = env::var("LEVO_SENSOR_ENABLED")
            .map(|val| val.to_lowercase() != "false")
            .unwrap_or(true);

        let sampling_rate = env_parse("LEVO_SAMPLING_RATE", DEFAULT_SAMPLING_RATE);
        let size_threshold_kb = env_parse("LEVO_SIZE_THRESHOLD_KB", DEFAULT_SIZE_THRESHOLD_KB);
        let timeout_seconds = env_parse("LEVO_TIMEOUT_SECONDS", DEFAULT_TIMEOUT_SECONDS);
        let max_retries = env_parse("LEVO_MAX_RETRIES", DEFAULT_MAX_RETRIES);

        let exclude_paths = env::var("LEVO_EXCLUDE_PATHS")
            .map(|val| split_list(&val))
            .unwrap_or_else(|_| default_exclude_paths());
        let filter_fields = env::var("LEVO_FILTER_FIELDS")
            .map(|val| split_list(&val))
            .unwrap_or_else(|_| default_filter_fields());

        let config = Config {
            enabled,
            collector_url,
            sampling_rate: clamp_sampling_rate(sampling_rate),
            exclude_paths,
            filter_fields,
            size_threshold_kb,
            timeout_seconds,
            max_retries,
            organization_id: env::var("LEVO_ORGANIZATION_ID").ok(),
            environment: env::var("LEVO_ENV").unwrap_or_else(|_| "production".to_string()),
            service_name: env::var("LEVO_SERVICE_NAME")
                .unwrap_or_else(|_| "unknown-service".to_string()),
            host_name: env::var("LEVO_HOST_NAME")
                .or_else(|_| env::var("HOSTNAME"))
                .unwrap_or_else(|_| "unknown-host".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the collector URL is present and parseable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collector_url.is_empty() {
            return Err(ConfigError::MissingCollectorUrl);
        }
        Url::parse(&self.collector_url).map_err(|e| ConfigError::InvalidCollectorUrl {
            url: self.collector_url.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Returns true when the given request path starts with any excluded prefix.
    pub fn path_excluded(&self, path: &str) -> bool {
        self.exclude_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            enabled: true,
            collector_url: String::new(),
            sampling_rate: DEFAULT_SAMPLING_RATE,
            exclude_paths: default_exclude_paths(),
            filter_fields: default_filter_fields(),
            size_threshold_kb: DEFAULT_SIZE_THRESHOLD_KB,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_retries: DEFAULT_MAX_RETRIES,
            organization_id: None,
            environment: "production".to_string(),
            service_name: "unknown-service".to_string(),
            host_name: "unknown-host".to_string(),
        }
    }
}

/// Parses an env var, keeping the default (with a warning) on malformed input.
fn env_parse<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(var = name, value = %raw, "ignoring unparseable value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn clamp_sampling_rate(rate: f64) -> f64 {
    if !(0.0..=1.0).contains(&rate) {
        warn!(rate, "sampling rate outside [0.0, 1.0], clamping");
    }
    rate.clamp(0.0, 1.0)
}
