//! Run configuration.

use crate::errors::ConfigError;
use crate::pipeline::DiscoveryMode;
use crate::store::{Store, WriteMode, DIAGNOSTICS_KEY, STRICT_MISSING_KEY};
use serde::{Deserialize, Serialize};

/// Enables Debug diagnostics when truthy.
pub const ENV_DIAGNOSTICS: &str = "STEPFLOW_DIAGNOSTICS";
/// Makes strict reads fail on absent keys when truthy.
pub const ENV_STRICT_MISSING_KEY: &str = "STEPFLOW_STRICT_MISSING_KEY";
/// Selects the discovery mode: `marked` or `all`.
pub const ENV_DISCOVERY: &str = "STEPFLOW_DISCOVERY";

/// Settings applied to an engine and the stores it runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Record Debug diagnostics in the store's message log.
    #[serde(default)]
    pub diagnostics: bool,
    /// Fail strict reads of absent keys.
    #[serde(default)]
    pub strict_missing_key: bool,
    /// Which unmarked steps are discovered.
    #[serde(default = "default_discovery")]
    pub discovery: DiscoveryMode,
}

fn default_discovery() -> DiscoveryMode {
    DiscoveryMode::IncludeMarkedOnly
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            diagnostics: false,
            strict_missing_key: false,
            discovery: default_discovery(),
        }
    }
}

impl RunConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables diagnostics.
    #[must_use]
    pub const fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    /// Enables or disables strict missing-key reads.
    #[must_use]
    pub const fn with_strict_missing_key(mut self, strict: bool) -> Self {
        self.strict_missing_key = strict;
        self
    }

    /// Sets the discovery mode.
    #[must_use]
    pub const fn with_discovery(mut self, discovery: DiscoveryMode) -> Self {
        self.discovery = discovery;
        self
    }

    /// Loads defaults overridden by `STEPFLOW_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` for a variable that does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Loads defaults overridden by the variables `lookup` returns.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` for a variable that does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().overridden_by(lookup)
    }

    /// Returns this configuration with the variables `lookup` returns
    /// applied on top.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` for a variable that does not parse.
    pub fn overridden_by<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DIAGNOSTICS) {
            self.diagnostics = parse_flag(ENV_DIAGNOSTICS, &value)?;
        }
        if let Some(value) = lookup(ENV_STRICT_MISSING_KEY) {
            self.strict_missing_key = parse_flag(ENV_STRICT_MISSING_KEY, &value)?;
        }
        if let Some(value) = lookup(ENV_DISCOVERY) {
            self.discovery = parse_discovery(&value)?;
        }
        Ok(self)
    }

    /// Parses a JSON configuration document. Absent fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns `Parse` when the document is not a valid configuration.
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Writes the run flags into a store.
    pub fn apply_to(&self, store: &Store, mode: WriteMode) {
        store.set(DIAGNOSTICS_KEY, self.diagnostics, mode);
        store.set(STRICT_MISSING_KEY, self.strict_missing_key, mode);
    }
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_discovery(value: &str) -> Result<DiscoveryMode, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "marked" | "include_marked_only" => Ok(DiscoveryMode::IncludeMarkedOnly),
        "all" | "include_all" => Ok(DiscoveryMode::IncludeAll),
        _ => Err(ConfigError::InvalidValue {
            var: ENV_DISCOVERY.to_string(),
            value: value.to_string(),
        }),
    }
}
