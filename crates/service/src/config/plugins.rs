//! Regular-plugin configuration

use std::sync::Arc;
use std::time::Duration;

use cardbroker_core::{
    Plugin, PluginObservationExceptionHandler, ReaderConfigurator,
    ReaderObservationExceptionHandler,
};

use super::AllocationStrategy;
use crate::error::{Error, Result};

/// A regular plugin together with its reader setup hook and optional
/// observation error handlers.
///
/// Plugin monitoring (reader connection/disconnection events) is enabled by
/// supplying a plugin observation handler; reader monitoring (card
/// insertion/removal events) by supplying a reader observation handler.
#[derive(Clone)]
pub struct ConfiguredPlugin {
    plugin: Arc<dyn Plugin>,
    reader_configurator: Arc<dyn ReaderConfigurator>,
    plugin_observation_handler: Option<Arc<dyn PluginObservationExceptionHandler>>,
    reader_observation_handler: Option<Arc<dyn ReaderObservationExceptionHandler>>,
}

impl ConfiguredPlugin {
    /// The configured plugin
    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    /// The reader setup hook to run on first activation of each reader
    pub fn reader_configurator(&self) -> &Arc<dyn ReaderConfigurator> {
        &self.reader_configurator
    }

    /// Whether reader connection/disconnection monitoring is requested
    pub fn with_plugin_monitoring(&self) -> bool {
        self.plugin_observation_handler.is_some()
    }

    /// Handler for plugin observation errors, when monitoring is requested
    pub fn plugin_observation_handler(&self) -> Option<&Arc<dyn PluginObservationExceptionHandler>> {
        self.plugin_observation_handler.as_ref()
    }

    /// Whether card insertion/removal monitoring is requested
    pub fn with_reader_monitoring(&self) -> bool {
        self.reader_observation_handler.is_some()
    }

    /// Handler for reader observation errors, when monitoring is requested
    pub fn reader_observation_handler(&self) -> Option<&Arc<dyn ReaderObservationExceptionHandler>> {
        self.reader_observation_handler.as_ref()
    }
}

/// Set of regular plugins with their allocation strategy and usage timeout
pub struct PluginsConfigurator {
    plugins: Vec<Arc<dyn Plugin>>,
    configured_plugins: Vec<ConfiguredPlugin>,
    allocation_strategy: AllocationStrategy,
    usage_timeout: Duration,
}

impl PluginsConfigurator {
    /// Start building a regular-plugin configuration
    pub fn builder() -> PluginsConfiguratorBuilder {
        PluginsConfiguratorBuilder::default()
    }

    /// The configured plugins, in registration order
    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// The per-plugin configuration records, in registration order
    pub fn configured_plugins(&self) -> &[ConfiguredPlugin] {
        &self.configured_plugins
    }

    /// The allocation strategy applied to profile candidate lists
    pub fn allocation_strategy(&self) -> AllocationStrategy {
        self.allocation_strategy
    }

    /// The usage timeout; zero means a lock never expires
    pub fn usage_timeout(&self) -> Duration {
        self.usage_timeout
    }
}

/// Builder for [`PluginsConfigurator`].
///
/// Each policy setter may be invoked at most once; a second invocation is an
/// [`Error::InvalidState`].
#[derive(Default)]
pub struct PluginsConfiguratorBuilder {
    plugins: Vec<Arc<dyn Plugin>>,
    configured_plugins: Vec<ConfiguredPlugin>,
    allocation_strategy: Option<AllocationStrategy>,
    usage_timeout: Option<Duration>,
}

impl PluginsConfiguratorBuilder {
    /// Select the allocation strategy (default: [`AllocationStrategy::First`])
    pub fn with_allocation_strategy(mut self, strategy: AllocationStrategy) -> Result<Self> {
        if self.allocation_strategy.is_some() {
            return Err(Error::state("allocation strategy already configured"));
        }
        self.allocation_strategy = Some(strategy);
        Ok(self)
    }

    /// Bound how long one caller may hold a reader lock before another
    /// caller's attempt forcibly reclaims it (default: no bound)
    pub fn with_usage_timeout(mut self, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(Error::argument("usage timeout must be at least 1ms"));
        }
        if self.usage_timeout.is_some() {
            return Err(Error::state("usage timeout already configured"));
        }
        self.usage_timeout = Some(timeout);
        Ok(self)
    }

    /// Register a plugin without observation
    pub fn add_plugin(
        self,
        plugin: Arc<dyn Plugin>,
        reader_configurator: Arc<dyn ReaderConfigurator>,
    ) -> Result<Self> {
        self.add_plugin_with_monitoring(plugin, reader_configurator, None, None)
    }

    /// Register a plugin, optionally enabling plugin and/or reader
    /// monitoring by supplying the corresponding observation error handler
    pub fn add_plugin_with_monitoring(
        mut self,
        plugin: Arc<dyn Plugin>,
        reader_configurator: Arc<dyn ReaderConfigurator>,
        plugin_observation_handler: Option<Arc<dyn PluginObservationExceptionHandler>>,
        reader_observation_handler: Option<Arc<dyn ReaderObservationExceptionHandler>>,
    ) -> Result<Self> {
        if Arc::clone(&plugin).as_pool().is_some() {
            return Err(Error::argument(
                "a pool plugin cannot be registered as a regular plugin",
            ));
        }
        if self.plugins.iter().any(|p| p.name() == plugin.name()) {
            return Err(Error::state(format!(
                "plugin '{}' already configured",
                plugin.name()
            )));
        }
        self.plugins.push(Arc::clone(&plugin));
        self.configured_plugins.push(ConfiguredPlugin {
            plugin,
            reader_configurator,
            plugin_observation_handler,
            reader_observation_handler,
        });
        Ok(self)
    }

    /// Freeze the configuration
    pub fn build(self) -> Result<PluginsConfigurator> {
        if self.plugins.is_empty() {
            return Err(Error::state("no plugin was configured"));
        }
        Ok(PluginsConfigurator {
            plugins: self.plugins,
            configured_plugins: self.configured_plugins,
            allocation_strategy: self.allocation_strategy.unwrap_or_default(),
            // Zero means a lock never expires
            usage_timeout: self.usage_timeout.unwrap_or(Duration::ZERO),
        })
    }
}
