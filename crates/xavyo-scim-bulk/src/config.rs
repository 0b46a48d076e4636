//! Bulk endpoint configuration.
//!
//! Limits default to conservative values and can be overridden from the
//! environment. Loading fails fast with the name of the offending variable.

use std::env;

use serde_json::json;
use thiserror::Error;

/// Environment variable for the maximum number of operations per request.
pub const ENV_MAX_OPERATIONS: &str = "SCIM_BULK_MAX_OPERATIONS";

/// Environment variable for the maximum request payload in bytes.
pub const ENV_MAX_PAYLOAD_SIZE: &str = "SCIM_BULK_MAX_PAYLOAD_SIZE";

/// Environment variable for the default `failOnErrors` threshold.
pub const ENV_FAIL_ON_ERRORS: &str = "SCIM_BULK_FAIL_ON_ERRORS";

/// Configuration loading errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be used.
    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Limits and defaults for bulk processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkConfig {
    /// Maximum number of operations in one bulk request.
    pub max_operations: usize,
    /// Maximum size of the bulk request body in bytes.
    pub max_payload_size: usize,
    /// `failOnErrors` applied when the client does not send one.
    /// `None` processes every operation regardless of failures.
    pub default_fail_on_errors: Option<u32>,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_operations: Self::DEFAULT_MAX_OPERATIONS,
            max_payload_size: Self::DEFAULT_MAX_PAYLOAD_SIZE,
            default_fail_on_errors: None,
        }
    }
}

impl BulkConfig {
    /// Default operation limit.
    pub const DEFAULT_MAX_OPERATIONS: usize = 1000;

    /// Default payload limit (1 MiB).
    pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1_048_576;

    /// Load configuration from environment variables, falling back to defaults
    /// for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_operations = parse_var(&lookup, ENV_MAX_OPERATIONS)?
            .unwrap_or(defaults.max_operations);
        if max_operations == 0 {
            return Err(ConfigError::InvalidValue {
                var: ENV_MAX_OPERATIONS.to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let max_payload_size = parse_var(&lookup, ENV_MAX_PAYLOAD_SIZE)?
            .unwrap_or(defaults.max_payload_size);

        let default_fail_on_errors = parse_var::<u32, _>(&lookup, ENV_FAIL_ON_ERRORS)?
            .filter(|threshold| *threshold > 0);

        let config = Self {
            max_operations,
            max_payload_size,
            default_fail_on_errors,
        };
        tracing::debug!(
            max_operations = config.max_operations,
            max_payload_size = config.max_payload_size,
            fail_on_errors = ?config.default_fail_on_errors,
            "Bulk configuration loaded"
        );
        Ok(config)
    }

    /// Set the operation limit.
    #[must_use]
    pub fn with_max_operations(mut self, max_operations: usize) -> Self {
        self.max_operations = max_operations;
        self
    }

    /// Set the payload limit.
    #[must_use]
    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    /// Set the default `failOnErrors` threshold.
    #[must_use]
    pub fn with_default_fail_on_errors(mut self, threshold: Option<u32>) -> Self {
        self.default_fail_on_errors = threshold.filter(|t| *t > 0);
        self
    }

    /// The `bulk` member of the ServiceProviderConfig resource
    /// (RFC 7643 Section 5).
    #[must_use]
    pub fn service_provider_bulk(&self) -> serde_json::Value {
        json!({
            "supported": true,
            "maxOperations": self.max_operations,
            "maxPayloadSize": self.max_payload_size,
        })
    }
}

fn parse_var<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                var: var.to_string(),
                message: e.to_string(),
            }),
        _ => Ok(None),
    }
}
