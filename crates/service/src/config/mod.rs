//! Service configuration: plugin sets, allocation policy, profiles
//!
//! Configuration is assembled through builders
//! ([`PluginsConfigurator`], [`PoolPluginsConfigurator`],
//! [`CardResourceProfile::builder`]) and committed to the service through
//! [`CardResourceServiceConfigurator`]; once installed it is frozen until
//! the next `configure` call.

mod plugins;
mod pool_plugins;
mod profile;
mod service_configurator;

pub use plugins::{ConfiguredPlugin, PluginsConfigurator, PluginsConfiguratorBuilder};
pub use pool_plugins::{PoolPluginsConfigurator, PoolPluginsConfiguratorBuilder};
pub use profile::{CardResourceProfile, CardResourceProfileBuilder};
pub use service_configurator::CardResourceServiceConfigurator;

use std::sync::Arc;
use std::time::Duration;

use cardbroker_core::{Plugin, PoolPlugin};

/// How a profile's candidate list is re-ordered after a successful
/// allocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AllocationStrategy {
    /// Keep insertion order; the next allocation starts from the head again
    #[default]
    First,
    /// Rotate so the successor of the taken element becomes the new head
    Cyclic,
    /// Shuffle the list uniformly
    Random,
}

/// Blocking allocation parameters
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockingAllocation {
    /// Delay between two allocation attempts
    pub(crate) cycle: Duration,
    /// Ceiling on the total wait
    pub(crate) timeout: Duration,
}

/// Frozen snapshot installed into the service by
/// [`CardResourceServiceConfigurator::configure`]
pub(crate) struct Configuration {
    pub(crate) plugins: Vec<Arc<dyn Plugin>>,
    pub(crate) configured_plugins: Vec<ConfiguredPlugin>,
    pub(crate) pool_plugins: Vec<Arc<dyn PoolPlugin>>,
    pub(crate) allocation_strategy: AllocationStrategy,
    /// Max duration a caller may hold a reader lock; zero means infinite
    pub(crate) usage_timeout: Duration,
    pub(crate) use_pool_first: bool,
    pub(crate) profiles: Vec<CardResourceProfile>,
    pub(crate) blocking: Option<BlockingAllocation>,
}

impl Configuration {
    /// Look up a regular plugin by name
    pub(crate) fn plugin(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.iter().find(|p| p.name() == name)
    }

    /// Look up the configured-plugin record for a plugin name
    pub(crate) fn configured_plugin(&self, name: &str) -> Option<&ConfiguredPlugin> {
        self.configured_plugins
            .iter()
            .find(|cp| cp.plugin().name() == name)
    }
}
