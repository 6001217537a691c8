//! Top-level configurator committing a configuration to the service

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::{
    BlockingAllocation, CardResourceProfile, Configuration, PluginsConfigurator,
    PoolPluginsConfigurator,
};
use crate::error::{Error, Result};
use crate::service::CardResourceService;

/// Assembles a [`Configuration`] and installs it into the service.
///
/// Obtained from
/// [`CardResourceService::configurator`](crate::CardResourceService::configurator).
/// Each `with_*` step may be invoked at most once;
/// [`configure`](Self::configure) validates the whole and commits it.
pub struct CardResourceServiceConfigurator {
    service: Arc<CardResourceService>,
    plugins: Option<PluginsConfigurator>,
    pool_plugins: Option<PoolPluginsConfigurator>,
    profiles: Option<Vec<CardResourceProfile>>,
    blocking: Option<BlockingAllocation>,
}

impl CardResourceServiceConfigurator {
    pub(crate) fn new(service: Arc<CardResourceService>) -> Self {
        Self {
            service,
            plugins: None,
            pool_plugins: None,
            profiles: None,
            blocking: None,
        }
    }

    /// Install the regular plugins
    pub fn with_plugins(mut self, plugins: PluginsConfigurator) -> Result<Self> {
        if self.plugins.is_some() {
            return Err(Error::state("plugins already configured"));
        }
        self.plugins = Some(plugins);
        Ok(self)
    }

    /// Install the pool plugins
    pub fn with_pool_plugins(mut self, pool_plugins: PoolPluginsConfigurator) -> Result<Self> {
        if self.pool_plugins.is_some() {
            return Err(Error::state("pool plugins already configured"));
        }
        self.pool_plugins = Some(pool_plugins);
        Ok(self)
    }

    /// Install the card resource profiles
    pub fn with_card_resource_profiles(
        mut self,
        profiles: Vec<CardResourceProfile>,
    ) -> Result<Self> {
        if self.profiles.is_some() {
            return Err(Error::state("card resource profiles already configured"));
        }
        self.profiles = Some(profiles);
        Ok(self)
    }

    /// Make allocation block: retry every `cycle` until a resource is found
    /// or `timeout` elapses (default: a failed allocation returns
    /// immediately)
    pub fn with_blocking_allocation_mode(mut self, cycle: Duration, timeout: Duration) -> Result<Self> {
        if cycle.is_zero() {
            return Err(Error::argument("cycle duration must be at least 1ms"));
        }
        if timeout.is_zero() {
            return Err(Error::argument("timeout must be at least 1ms"));
        }
        if self.blocking.is_some() {
            return Err(Error::state("allocation mode already configured"));
        }
        self.blocking = Some(BlockingAllocation { cycle, timeout });
        Ok(self)
    }

    /// Validate the assembled configuration and install it into the
    /// service.
    ///
    /// Globally configured plugins that no profile can use are silently
    /// pruned. If the service is already started it is restarted on the new
    /// configuration.
    pub fn configure(self) -> Result<()> {
        let (mut plugins, mut configured_plugins, allocation_strategy, usage_timeout) =
            match self.plugins {
                Some(p) => (
                    p.plugins().to_vec(),
                    p.configured_plugins().to_vec(),
                    p.allocation_strategy(),
                    p.usage_timeout(),
                ),
                None => (Vec::new(), Vec::new(), Default::default(), Duration::ZERO),
            };
        let (mut pool_plugins, use_pool_first) = match self.pool_plugins {
            Some(p) => (p.pool_plugins().to_vec(), p.use_pool_first()),
            None => (Vec::new(), false),
        };
        let profiles = self.profiles.unwrap_or_default();

        // Check global plugins (regular + pool)
        let all_names: Vec<&str> = plugins
            .iter()
            .map(|p| p.name())
            .chain(pool_plugins.iter().map(|p| p.name()))
            .collect();
        if all_names.is_empty() {
            return Err(Error::state("no plugin configured"));
        }

        // Check card resource profiles
        if profiles.is_empty() {
            return Err(Error::state("no card resource profile configured"));
        }
        let mut profile_names = HashSet::new();
        for profile in &profiles {
            if !profile_names.insert(profile.name()) {
                return Err(Error::state(
                    "some card resource profiles are configured with the same profile name",
                ));
            }
            for plugin in profile.plugins() {
                if !all_names.contains(&plugin.name()) {
                    return Err(Error::state(
                        "some card resource profiles specify plugins which are not configured in the global list",
                    ));
                }
            }
        }

        // Prune plugins not usable by at least one profile: when every
        // profile names an explicit plugin subset, only the union of those
        // subsets is kept
        if profiles.iter().all(|p| !p.plugins().is_empty()) {
            let used: HashSet<&str> = profiles
                .iter()
                .flat_map(|p| p.plugins().iter().map(|plugin| plugin.name()))
                .collect();
            for name in all_names.iter().filter(|n| !used.contains(*n)) {
                debug!(plugin = *name, "pruning plugin not used by any profile");
            }
            plugins.retain(|p| used.contains(p.name()));
            configured_plugins.retain(|cp| used.contains(cp.plugin().name()));
            pool_plugins.retain(|p| used.contains(p.name()));
        }

        self.service.install(Configuration {
            plugins,
            configured_plugins,
            pool_plugins,
            allocation_strategy,
            usage_timeout,
            use_pool_first,
            profiles,
            blocking: self.blocking,
        })
    }
}
