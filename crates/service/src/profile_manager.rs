//! Per-profile search domain and allocation policy

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Instant;

use cardbroker_core::{Plugin, PoolPlugin};
use rand::seq::SliceRandom;
use tracing::debug;

use crate::config::{AllocationStrategy, CardResourceProfile, Configuration};
use crate::reader_manager::ReaderManager;
use crate::resource::CardResource;
use crate::service::CardResourceService;

/// Owns the ordered candidate list for one card resource profile and
/// applies the allocation policy to it.
///
/// The working list holds resources from regular plugins only; pool
/// resources are minted on demand and never cached here. Every listed
/// resource belongs to a reader accepted by the profile's reader-name
/// filter.
pub(crate) struct CardProfileManager {
    profile: CardResourceProfile,
    configuration: Arc<Configuration>,
    service: Weak<CardResourceService>,
    /// Regular plugins searched for this profile, in preference order
    plugins: Vec<Arc<dyn Plugin>>,
    /// Pool plugins searched for this profile, in preference order
    pool_plugins: Vec<Arc<dyn PoolPlugin>>,
    card_resources: Mutex<Vec<Arc<CardResource>>>,
}

impl CardProfileManager {
    /// Builds the manager and initializes its candidate list from the
    /// readers currently registered.
    ///
    /// A profile with an explicit plugin list searches those plugins only
    /// (split into regular and pool by capability); otherwise the
    /// service-global plugin lists apply.
    pub(crate) fn new(
        profile: CardResourceProfile,
        configuration: Arc<Configuration>,
        service: Weak<CardResourceService>,
        reader_managers: &HashMap<String, Arc<ReaderManager>>,
    ) -> Self {
        let mut plugins = Vec::new();
        let mut pool_plugins = Vec::new();
        if profile.plugins().is_empty() {
            plugins.extend(configuration.plugins.iter().cloned());
            pool_plugins.extend(configuration.pool_plugins.iter().cloned());
        } else {
            for plugin in profile.plugins() {
                match Arc::clone(plugin).as_pool() {
                    Some(pool) => pool_plugins.push(pool),
                    None => plugins.push(Arc::clone(plugin)),
                }
            }
        }

        let manager = Self {
            profile,
            configuration,
            service,
            plugins,
            pool_plugins,
            card_resources: Mutex::new(Vec::new()),
        };

        for plugin in &manager.plugins {
            for reader in plugin.readers() {
                if let Some(reader_manager) = reader_managers.get(reader.name()) {
                    manager.initialize_card_resource(reader_manager);
                }
            }
        }

        manager
    }

    /// Name of the managed profile
    pub(crate) fn name(&self) -> &str {
        self.profile.name()
    }

    /// A reader appeared on a plugin this profile searches
    pub(crate) fn on_reader_connected(&self, reader_manager: &Arc<ReaderManager>) {
        let plugin_name = reader_manager.plugin().name();
        if self.plugins.iter().any(|p| p.name() == plugin_name) {
            self.initialize_card_resource(reader_manager);
        }
    }

    /// A card was inserted into a reader this profile may use
    pub(crate) fn on_card_inserted(&self, reader_manager: &Arc<ReaderManager>) {
        self.on_reader_connected(reader_manager);
    }

    /// Drops `resource` from the candidate list
    pub(crate) fn remove_card_resource(&self, resource: &Arc<CardResource>) {
        let mut list = self.card_resources.lock().unwrap();
        let before = list.len();
        list.retain(|r| !Arc::ptr_eq(r, resource));
        if list.len() != before {
            debug!(
                profile = self.profile.name(),
                resource = ?resource,
                "removed card resource from profile"
            );
        }
    }

    /// Scans the reader for a matching card and appends the resulting
    /// resource to the candidate list.
    ///
    /// The returned resource may already be listed when the service starts
    /// with an observable reader holding an already-inserted card.
    fn initialize_card_resource(&self, reader_manager: &Arc<ReaderManager>) {
        if !self.profile.accepts_reader(reader_manager.reader().name()) {
            return;
        }
        reader_manager.activate();
        if let Some(resource) = reader_manager.matches(self.profile.extension().as_ref()) {
            let mut list = self.card_resources.lock().unwrap();
            if list.iter().any(|r| Arc::ptr_eq(r, &resource)) {
                debug!(
                    profile = self.profile.name(),
                    resource = ?resource,
                    "card resource already present in profile"
                );
            } else {
                debug!(
                    profile = self.profile.name(),
                    resource = ?resource,
                    "added card resource to profile"
                );
                list.push(resource);
            }
        }
    }

    /// Searches for an available card resource under the configured
    /// allocation mode.
    ///
    /// In blocking mode the search is retried every cycle until a resource
    /// is found or the timeout elapses; the sleep is not interruptible
    /// (a failed attempt always waits one full cycle).
    pub(crate) fn get_card_resource(&self) -> Option<Arc<CardResource>> {
        let deadline = self
            .configuration
            .blocking
            .map(|blocking| Instant::now() + blocking.timeout);

        loop {
            let resource = if !self.plugins.is_empty() {
                if !self.pool_plugins.is_empty() {
                    self.regular_or_pool_card_resource()
                } else {
                    self.regular_card_resource()
                }
            } else {
                self.pool_card_resource()
            };
            if resource.is_some() {
                return resource;
            }

            let blocking = self.configuration.blocking?;
            thread::sleep(blocking.cycle);
            match deadline {
                Some(deadline) if Instant::now() <= deadline => continue,
                _ => return None,
            }
        }
    }

    /// Regular and pool search combined, ordered by the pool precedence
    /// setting
    fn regular_or_pool_card_resource(&self) -> Option<Arc<CardResource>> {
        if self.configuration.use_pool_first {
            self.pool_card_resource()
                .or_else(|| self.regular_card_resource())
        } else {
            self.regular_card_resource()
                .or_else(|| self.pool_card_resource())
        }
    }

    /// Walks the candidate list and takes the first lockable resource.
    ///
    /// Candidates whose reader manager is gone, or whose lock attempt fails
    /// because the inserted card no longer matches, are unusable and are
    /// removed from the service after the walk.
    fn regular_card_resource(&self) -> Option<Arc<CardResource>> {
        let service = self.service.upgrade()?;
        let candidates = self.card_resources.lock().unwrap().clone();

        let mut result = None;
        let mut unusable = Vec::new();
        for resource in &candidates {
            match service.reader_manager(resource.reader().name()) {
                Some(reader_manager) => {
                    match reader_manager.lock(resource, self.profile.extension().as_ref()) {
                        Ok(true) => {
                            self.update_card_resources_order(resource);
                            result = Some(Arc::clone(resource));
                            break;
                        }
                        Ok(false) => {}
                        Err(_) => unusable.push(Arc::clone(resource)),
                    }
                }
                None => unusable.push(Arc::clone(resource)),
            }
        }

        for resource in &unusable {
            if let Err(e) = service.remove_card_resource(resource) {
                debug!(resource = ?resource, error = %e, "could not remove unusable card resource");
            }
        }

        result
    }

    /// Re-orders the candidate list after a successful take
    fn update_card_resources_order(&self, taken: &Arc<CardResource>) {
        let mut list = self.card_resources.lock().unwrap();
        match self.configuration.allocation_strategy {
            AllocationStrategy::First => {}
            AllocationStrategy::Cyclic => {
                if let Some(index) = list.iter().position(|r| Arc::ptr_eq(r, taken)) {
                    // The successor of the taken element becomes the head;
                    // rotating by the full length is the identity
                    list.rotate_left(index + 1);
                }
            }
            AllocationStrategy::Random => {
                list.shuffle(&mut rand::thread_rng());
            }
        }
    }

    /// Asks each pool plugin in order for a reader holding a matching
    /// card.
    ///
    /// Pools are independent: a failing pool is skipped and the next one is
    /// tried.
    fn pool_card_resource(&self) -> Option<Arc<CardResource>> {
        let service = self.service.upgrade()?;
        for pool_plugin in &self.pool_plugins {
            let reader = match pool_plugin.allocate_reader(self.profile.reader_group_reference()) {
                Ok(Some(reader)) => reader,
                Ok(None) => continue,
                Err(e) => {
                    debug!(
                        plugin = pool_plugin.name(),
                        error = %e,
                        "pool reader allocation failed, trying next pool"
                    );
                    continue;
                }
            };
            if let Some(smart_card) = self.profile.extension().matches(&reader) {
                let resource = Arc::new(CardResource::new(reader, smart_card));
                service.register_pool_resource(&resource, pool_plugin);
                return Some(resource);
            }
        }
        None
    }
}
