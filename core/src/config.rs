//! TOML configuration for named backoff policies.
//!
//! ```toml
//! [policies.writes]
//! kind = "constant"
//! interval_ms = 50
//! max_retries = 8
//!
//! [policies.batch]
//! kind = "scheduled"
//! delays_ms = [10, 20, 40, 80]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backoff::{BackOffPolicy, ConstantBackOff, ScheduledBackOff, StopBackOff, ZeroBackOff};
use crate::policy::PolicyRegistry;

/// Errors produced while loading or validating policy configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read retry config {path}: {source}")]
    Read {
        /// File that was being read
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },
    /// The document is not valid TOML or does not match the schema
    #[error("invalid retry config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A constant policy without `interval_ms`
    #[error("policy '{0}' is constant but has no interval_ms")]
    MissingInterval(String),
    /// A scheduled policy without delays
    #[error("policy '{0}' is scheduled but delays_ms is empty")]
    EmptySchedule(String),
}

/// Strategy named in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackOffKind {
    /// Fixed `interval_ms` between attempts
    Constant,
    /// Retry immediately
    Zero,
    /// Never retry
    Stop,
    /// Explicit `delays_ms` list
    Scheduled,
}

/// One policy entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackOffConfig {
    /// Strategy
    pub kind: BackOffKind,
    /// Interval for `constant`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    /// Delays for `scheduled`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delays_ms: Vec<u64>,
    /// Optional cap on retries per session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl BackOffConfig {
    /// Validate the entry and build the policy it describes.
    ///
    /// `name` is only used in error messages.
    pub fn build(&self, name: &str) -> Result<BackOffPolicy, ConfigError> {
        let policy: BackOffPolicy = match self.kind {
            BackOffKind::Constant => {
                let interval = self
                    .interval_ms
                    .ok_or_else(|| ConfigError::MissingInterval(name.to_string()))?;
                ConstantBackOff::new(Duration::from_millis(interval)).into()
            }
            BackOffKind::Zero => ZeroBackOff.into(),
            BackOffKind::Stop => StopBackOff.into(),
            BackOffKind::Scheduled => {
                if self.delays_ms.is_empty() {
                    return Err(ConfigError::EmptySchedule(name.to_string()));
                }
                ScheduledBackOff::from_millis(self.delays_ms.iter().copied()).into()
            }
        };

        Ok(match self.max_retries {
            Some(max) => BackOffPolicy::with_max_retries(policy, max),
            None => policy,
        })
    }
}

/// Top-level retry configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Policies keyed by name
    #[serde(default)]
    pub policies: BTreeMap<String, BackOffConfig>,
}

impl RetryConfig {
    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(
            path = %path.display(),
            policies = config.policies.len(),
            "loaded retry config"
        );
        Ok(config)
    }

    /// Validate every entry and collect them into a registry
    pub fn registry(&self) -> Result<PolicyRegistry, ConfigError> {
        let mut registry = PolicyRegistry::new();
        for (name, entry) in &self.policies {
            registry.register(name.clone(), entry.build(name)?);
        }
        Ok(registry)
    }
}

impl FromStr for RetryConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}
