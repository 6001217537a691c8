//! Pool-plugin configuration

use std::sync::Arc;

use cardbroker_core::PoolPlugin;

use crate::error::{Error, Result};

/// Set of pool plugins with their precedence over regular plugins
pub struct PoolPluginsConfigurator {
    pool_plugins: Vec<Arc<dyn PoolPlugin>>,
    use_pool_first: bool,
}

impl PoolPluginsConfigurator {
    /// Start building a pool-plugin configuration
    pub fn builder() -> PoolPluginsConfiguratorBuilder {
        PoolPluginsConfiguratorBuilder::default()
    }

    /// The configured pool plugins, in registration order
    pub fn pool_plugins(&self) -> &[Arc<dyn PoolPlugin>] {
        &self.pool_plugins
    }

    /// Whether pools are tried before regular readers during allocation
    pub fn use_pool_first(&self) -> bool {
        self.use_pool_first
    }
}

/// Builder for [`PoolPluginsConfigurator`]
#[derive(Default)]
pub struct PoolPluginsConfiguratorBuilder {
    pool_plugins: Vec<Arc<dyn PoolPlugin>>,
    use_pool_first: Option<bool>,
}

impl PoolPluginsConfiguratorBuilder {
    /// Try pool plugins before regular readers when a profile has both
    /// (default: regular readers first). May be invoked at most once.
    pub fn use_pool_first(mut self) -> Result<Self> {
        if self.use_pool_first.is_some() {
            return Err(Error::state("pool plugins priority already configured"));
        }
        self.use_pool_first = Some(true);
        Ok(self)
    }

    /// Register a pool plugin
    pub fn add_pool_plugin(mut self, pool_plugin: Arc<dyn PoolPlugin>) -> Result<Self> {
        if self
            .pool_plugins
            .iter()
            .any(|p| p.name() == pool_plugin.name())
        {
            return Err(Error::state(format!(
                "pool plugin '{}' already configured",
                pool_plugin.name()
            )));
        }
        self.pool_plugins.push(pool_plugin);
        Ok(self)
    }

    /// Freeze the configuration
    pub fn build(self) -> Result<PoolPluginsConfigurator> {
        if self.pool_plugins.is_empty() {
            return Err(Error::state("no pool plugin was configured"));
        }
        Ok(PoolPluginsConfigurator {
            pool_plugins: self.pool_plugins,
            use_pool_first: self.use_pool_first.unwrap_or(false),
        })
    }
}
