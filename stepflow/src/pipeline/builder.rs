//! Engine builder with validation.

use super::discovery::{discover, DiscoveryMode};
use super::ordering::order;
use super::Engine;
use crate::config::RunConfig;
use crate::errors::ConstructionError;
use crate::services::ServiceLookup;
use crate::steps::StepSource;
use std::fmt;
use std::sync::Arc;

/// Builder for creating validated engines.
///
/// Discovery and ordering happen in [`EngineBuilder::build`]; every
/// construction error surfaces there, before any step runs.
pub struct EngineBuilder<'a> {
    source: &'a dyn StepSource,
    config: RunConfig,
    services: Option<Arc<dyn ServiceLookup>>,
}

impl<'a> EngineBuilder<'a> {
    /// Creates a builder over a step source.
    #[must_use]
    pub fn new(source: &'a dyn StepSource) -> Self {
        Self {
            source,
            config: RunConfig::default(),
            services: None,
        }
    }

    /// Sets the discovery mode.
    #[must_use]
    pub fn with_discovery(mut self, mode: DiscoveryMode) -> Self {
        self.config.discovery = mode;
        self
    }

    /// Discovers unmarked steps as well.
    #[must_use]
    pub fn include_all(self) -> Self {
        self.with_discovery(DiscoveryMode::IncludeAll)
    }

    /// Replaces the run configuration.
    #[must_use]
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Enables or disables diagnostics.
    #[must_use]
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.config.diagnostics = enabled;
        self
    }

    /// Enables or disables strict missing-key reads.
    #[must_use]
    pub fn with_strict_missing_key(mut self, strict: bool) -> Self {
        self.config.strict_missing_key = strict;
        self
    }

    /// Sets the service lookup consulted during resolution.
    #[must_use]
    pub fn with_services(self, services: impl ServiceLookup + 'static) -> Self {
        self.with_shared_services(Arc::new(services))
    }

    /// Sets a shared service lookup.
    #[must_use]
    pub fn with_shared_services(mut self, services: Arc<dyn ServiceLookup>) -> Self {
        self.services = Some(services);
        self
    }

    /// Discovers and orders the steps.
    ///
    /// # Errors
    ///
    /// Returns a [`ConstructionError`] for duplicate names and invalid
    /// explicit predecessors.
    pub fn build(self) -> Result<Engine, ConstructionError> {
        let name = self.source.name().to_string();
        let candidates = discover(self.source, self.config.discovery).map_err(|err| {
            tracing::warn!(pipeline = %name, code = err.code(), error = %err, "discovery failed");
            err
        })?;
        let planned = order(&candidates).map_err(|err| {
            tracing::warn!(pipeline = %name, code = err.code(), error = %err, "ordering failed");
            err
        })?;

        let mut slots: Vec<_> = candidates.into_iter().map(Some).collect();
        let steps: Vec<_> = planned
            .into_iter()
            .filter_map(|index| slots.get_mut(index).and_then(Option::take))
            .collect();

        tracing::debug!(
            pipeline = %name,
            plan = ?steps.iter().map(|step| step.name()).collect::<Vec<_>>(),
            "engine built"
        );
        Ok(Engine::new(name, steps, self.services, self.config))
    }
}

impl fmt::Debug for EngineBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("source", &self.source.name())
            .field("config", &self.config)
            .field("services", &self.services.is_some())
            .finish()
    }
}
