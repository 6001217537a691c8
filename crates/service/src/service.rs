//! Process-wide coordinator for card resource allocation

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use cardbroker_core::{
    CardReader, CardReaderEvent, CardReaderEventKind, CardReaderObserver, DetectionMode,
    ObservableCardReader, Plugin, PluginEvent, PluginEventKind, PluginObserver, PoolPlugin,
};
use tracing::{debug, info};

use crate::config::{CardResourceServiceConfigurator, Configuration, ConfiguredPlugin};
use crate::error::{Error, Result};
use crate::profile_manager::CardProfileManager;
use crate::reader_manager::ReaderManager;
use crate::resource::CardResource;

/// Indexes owned by the service, guarded by the service mutex.
///
/// `started == false` implies every collection is empty.
#[derive(Default)]
struct ServiceState {
    started: bool,
    configuration: Option<Arc<Configuration>>,
    /// Reader name -> manager, for every known regular-plugin reader
    reader_managers: HashMap<String, Arc<ReaderManager>>,
    /// Profile managers in configuration order; events fan out in this
    /// order
    profile_managers: Vec<Arc<CardProfileManager>>,
    /// Resources currently allocated through a pool plugin
    pool_resources: Vec<(Arc<CardResource>, Arc<dyn PoolPlugin>)>,
    /// Plugin name -> observable readers the service tracks for it
    observed_readers: HashMap<String, Vec<Arc<dyn ObservableCardReader>>>,
}

/// Coordinator mediating between callers asking for a card resource and the
/// fluctuating population of readers.
///
/// The service maintains one [`ReaderManager`] per known regular reader and
/// one profile manager per configured profile, keeps them in sync with
/// plugin and reader events, and hands out card resources under the
/// configured allocation policy.
///
/// All index mutations and event-handler bodies are serialized by one
/// internal mutex. Allocation itself runs outside that mutex: two
/// concurrent [`get_card_resource`](Self::get_card_resource) calls contend
/// at each reader manager, and the loser moves on to the next candidate.
///
/// The service is entirely in-memory; stopping it drops every index and a
/// restart rebuilds them from the installed configuration.
pub struct CardResourceService {
    /// Self-handle used to register the service as an event observer
    me: Weak<CardResourceService>,
    state: Mutex<ServiceState>,
}

impl CardResourceService {
    /// Create a new, unconfigured service.
    ///
    /// Most applications use the process-wide handle from
    /// [`provider::get_service`](crate::provider::get_service) instead of
    /// owning an instance.
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            state: Mutex::new(ServiceState::default()),
        })
    }

    fn handle(&self) -> Arc<Self> {
        self.me.upgrade().expect("service handle is alive")
    }

    /// Start assembling a configuration for this service
    pub fn configurator(&self) -> CardResourceServiceConfigurator {
        CardResourceServiceConfigurator::new(self.handle())
    }

    /// Install a new configuration, restarting the service if it is
    /// running
    pub(crate) fn install(&self, configuration: Configuration) -> Result<()> {
        info!("applying a new configuration");
        let mut state = self.state.lock().unwrap();
        let configuration = Arc::new(configuration);
        if state.started {
            self.stop_locked(&mut state);
            state.configuration = Some(Arc::clone(&configuration));
            self.start_locked(&mut state, &configuration)?;
        } else {
            state.configuration = Some(configuration);
        }
        info!("new configuration applied");
        Ok(())
    }

    /// Build the reader and profile indexes from the installed
    /// configuration and start observation.
    ///
    /// Fails with [`Error::InvalidState`] when no configuration was
    /// installed. A running service is restarted.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let configuration = state
            .configuration
            .clone()
            .ok_or_else(|| Error::state("the card resource service is not configured"))?;
        if state.started {
            self.stop_locked(&mut state);
        }
        self.start_locked(&mut state, &configuration)
    }

    fn start_locked(&self, state: &mut ServiceState, configuration: &Arc<Configuration>) -> Result<()> {
        info!("starting the card resource service");

        // One reader manager per regular-plugin reader
        for plugin in &configuration.plugins {
            for reader in plugin.readers() {
                Self::register_reader_locked(state, configuration, reader, plugin);
            }
        }

        // One profile manager per profile; construction scans the readers
        // registered above
        for profile in &configuration.profiles {
            let manager = Arc::new(CardProfileManager::new(
                profile.clone(),
                Arc::clone(configuration),
                self.me.clone(),
                &state.reader_managers,
            ));
            state.profile_managers.push(manager);
        }

        // A reader accepted by no profile stays inactive; drop its manager
        let inactive: Vec<Arc<ReaderManager>> = state
            .reader_managers
            .values()
            .filter(|m| !m.is_active())
            .cloned()
            .collect();
        for manager in inactive {
            let reader_name = manager.reader().name().to_string();
            let plugin_name = manager.plugin().name().to_string();
            self.unregister_reader_locked(state, &reader_name, &plugin_name);
        }

        self.start_monitoring_locked(state, configuration);
        state.started = true;

        info!("card resource service started");
        Ok(())
    }

    /// Stop observation and drop every index.
    ///
    /// In-flight events short-circuit as soon as the started flag drops.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        self.stop_locked(&mut state);
    }

    fn stop_locked(&self, state: &mut ServiceState) {
        state.started = false;
        if let Some(configuration) = state.configuration.clone() {
            self.stop_monitoring_locked(state, &configuration);
        }
        state.reader_managers.clear();
        state.profile_managers.clear();
        state.pool_resources.clear();
        state.observed_readers.clear();
        info!("card resource service stopped");
    }

    /// Search the named profile for an available card resource.
    ///
    /// Returns `Ok(None)` when no resource is available (after the blocking
    /// timeout, when blocking allocation is configured). The returned
    /// resource is exclusively held by the caller until it is passed to
    /// [`release_card_resource`](Self::release_card_resource).
    pub fn get_card_resource(&self, profile_name: &str) -> Result<Option<Arc<CardResource>>> {
        debug!(profile = profile_name, "searching for a card resource");
        let manager = {
            let state = self.state.lock().unwrap();
            if !state.started {
                return Err(Error::state("the card resource service is not started"));
            }
            if profile_name.is_empty() {
                return Err(Error::argument("profile name must not be empty"));
            }
            state
                .profile_managers
                .iter()
                .find(|m| m.name() == profile_name)
                .cloned()
                .ok_or_else(|| {
                    Error::argument(format!("unknown card resource profile '{profile_name}'"))
                })?
        };

        // Allocation runs outside the service mutex; concurrent callers
        // contend at each reader manager instead
        let resource = manager.get_card_resource();
        debug!(
            profile = profile_name,
            found = resource.is_some(),
            "card resource search finished"
        );
        Ok(resource)
    }

    /// Give a card resource back.
    ///
    /// A regular resource unlocks its reader; a pool resource hands its
    /// reader back to the owning pool plugin. Releasing a resource twice is
    /// harmless.
    pub fn release_card_resource(&self, resource: &Arc<CardResource>) -> Result<()> {
        debug!(resource = ?resource, "releasing card resource");
        let mut state = self.state.lock().unwrap();
        if !state.started {
            return Err(Error::state("the card resource service is not started"));
        }
        Self::release_locked(&mut state, resource);
        Ok(())
    }

    fn release_locked(state: &mut ServiceState, resource: &Arc<CardResource>) {
        if let Some(manager) = state.reader_managers.get(resource.reader().name()) {
            manager.unlock();
        } else if let Some(index) = state
            .pool_resources
            .iter()
            .position(|(r, _)| Arc::ptr_eq(r, resource))
        {
            let (_, pool_plugin) = state.pool_resources.remove(index);
            pool_plugin.release_reader(resource.reader());
        }
    }

    /// Release a card resource and forget it entirely: the resource is
    /// dropped from its reader manager and from every profile
    pub fn remove_card_resource(&self, resource: &Arc<CardResource>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.started {
            return Err(Error::state("the card resource service is not started"));
        }
        Self::remove_locked(&mut state, resource);
        Ok(())
    }

    fn remove_locked(state: &mut ServiceState, resource: &Arc<CardResource>) {
        Self::release_locked(state, resource);
        if let Some(manager) = state.reader_managers.get(resource.reader().name()).cloned() {
            manager.remove_card_resource(resource);
            for profile_manager in &state.profile_managers {
                profile_manager.remove_card_resource(resource);
            }
        }
        debug!(resource = ?resource, "card resource removed");
    }

    /// Look up the manager of a regular reader by reader name
    pub(crate) fn reader_manager(&self, reader_name: &str) -> Option<Arc<ReaderManager>> {
        self.state
            .lock()
            .unwrap()
            .reader_managers
            .get(reader_name)
            .cloned()
    }

    /// Record that `resource` was allocated through `pool_plugin`
    pub(crate) fn register_pool_resource(
        &self,
        resource: &Arc<CardResource>,
        pool_plugin: &Arc<dyn PoolPlugin>,
    ) {
        let mut state = self.state.lock().unwrap();
        state
            .pool_resources
            .push((Arc::clone(resource), Arc::clone(pool_plugin)));
    }

    fn register_reader_locked(
        state: &mut ServiceState,
        configuration: &Arc<Configuration>,
        reader: Arc<dyn CardReader>,
        plugin: &Arc<dyn Plugin>,
    ) -> Arc<ReaderManager> {
        let reader_configurator = configuration
            .configured_plugin(plugin.name())
            .map(|cp| Arc::clone(cp.reader_configurator()));
        let manager = Arc::new(ReaderManager::new(
            Arc::clone(&reader),
            Arc::clone(plugin),
            reader_configurator,
            configuration.usage_timeout,
        ));
        state
            .reader_managers
            .insert(reader.name().to_string(), Arc::clone(&manager));
        if let Some(observable) = Arc::clone(&reader).as_observable() {
            state
                .observed_readers
                .entry(plugin.name().to_string())
                .or_default()
                .push(observable);
        }
        manager
    }

    fn unregister_reader_locked(&self, state: &mut ServiceState, reader_name: &str, plugin_name: &str) {
        state.reader_managers.remove(reader_name);
        if let Some(readers) = state.observed_readers.get_mut(plugin_name) {
            if let Some(index) = readers.iter().position(|r| r.name() == reader_name) {
                let observable = readers.remove(index);
                let observer: Arc<dyn CardReaderObserver> = self.handle();
                observable.remove_observer(&observer);
            }
        }
    }

    fn start_monitoring_locked(&self, state: &ServiceState, configuration: &Arc<Configuration>) {
        for configured in &configuration.configured_plugins {
            if configured.with_plugin_monitoring() {
                if let Some(observable) = Arc::clone(configured.plugin()).as_observable() {
                    info!(
                        plugin = configured.plugin().name(),
                        "starting plugin monitoring"
                    );
                    if let Some(handler) = configured.plugin_observation_handler() {
                        observable.set_observation_exception_handler(Arc::clone(handler));
                    }
                    observable.add_observer(self.handle());
                }
            }
            if configured.with_reader_monitoring() {
                if let Some(readers) = state.observed_readers.get(configured.plugin().name()) {
                    for reader in readers {
                        info!(reader = reader.name(), "starting reader monitoring");
                        self.start_reader_observation(reader, configured);
                    }
                }
            }
        }
    }

    fn start_reader_observation(
        &self,
        reader: &Arc<dyn ObservableCardReader>,
        configured: &ConfiguredPlugin,
    ) {
        if let Some(handler) = configured.reader_observation_handler() {
            reader.set_observation_exception_handler(Arc::clone(handler));
        }
        reader.add_observer(self.handle());
        reader.start_card_detection(DetectionMode::Repeating);
    }

    fn stop_monitoring_locked(&self, state: &ServiceState, configuration: &Arc<Configuration>) {
        for configured in &configuration.configured_plugins {
            if configured.with_plugin_monitoring() {
                if let Some(observable) = Arc::clone(configured.plugin()).as_observable() {
                    info!(
                        plugin = configured.plugin().name(),
                        "stopping plugin monitoring"
                    );
                    let observer: Arc<dyn PluginObserver> = self.handle();
                    observable.remove_observer(&observer);
                }
            }
            if configured.with_reader_monitoring() {
                if let Some(readers) = state.observed_readers.get(configured.plugin().name()) {
                    for reader in readers {
                        info!(reader = reader.name(), "stopping reader monitoring");
                        let observer: Arc<dyn CardReaderObserver> = self.handle();
                        reader.remove_observer(&observer);
                    }
                }
            }
        }
    }

    fn on_reader_connected_locked(
        &self,
        state: &mut ServiceState,
        configuration: &Arc<Configuration>,
        reader: Arc<dyn CardReader>,
        plugin: &Arc<dyn Plugin>,
    ) {
        let manager = Self::register_reader_locked(state, configuration, Arc::clone(&reader), plugin);
        let profile_managers = state.profile_managers.clone();
        for profile_manager in &profile_managers {
            profile_manager.on_reader_connected(&manager);
        }
        if manager.is_active() {
            if let Some(configured) = configuration.configured_plugin(plugin.name()) {
                if configured.with_reader_monitoring() {
                    if let Some(observable) = Arc::clone(&reader).as_observable() {
                        info!(reader = reader.name(), "starting reader monitoring");
                        self.start_reader_observation(&observable, configured);
                    }
                }
            }
        } else {
            // No profile accepted the reader
            self.unregister_reader_locked(state, reader.name(), plugin.name());
        }
    }

    fn on_reader_disconnected_locked(
        &self,
        state: &mut ServiceState,
        reader_name: &str,
        plugin_name: &str,
    ) {
        if let Some(manager) = state.reader_managers.get(reader_name).cloned() {
            debug!(
                reader = reader_name,
                "removing disconnected reader and all its card resources"
            );
            Self::on_card_removed_locked(state, &manager);
            self.unregister_reader_locked(state, reader_name, plugin_name);
        }
    }

    fn on_card_removed_locked(state: &mut ServiceState, manager: &Arc<ReaderManager>) {
        for resource in manager.card_resources() {
            Self::remove_locked(state, &resource);
        }
    }
}

impl PluginObserver for CardResourceService {
    fn on_plugin_event(&self, event: &PluginEvent) {
        let mut state = self.state.lock().unwrap();
        if !state.started {
            return;
        }
        let Some(configuration) = state.configuration.clone() else {
            return;
        };
        let Some(plugin) = configuration.plugin(event.plugin_name()).cloned() else {
            return;
        };
        match event.kind() {
            PluginEventKind::ReaderConnected => {
                for reader_name in event.reader_names() {
                    // The new reader is not yet registered here; fetch it
                    // from the plugin
                    if let Some(reader) = plugin.reader(reader_name) {
                        self.on_reader_connected_locked(&mut state, &configuration, reader, &plugin);
                    }
                }
            }
            PluginEventKind::ReaderDisconnected => {
                for reader_name in event.reader_names() {
                    // The reader is already gone from the plugin; it may
                    // still be registered here
                    if state.reader_managers.contains_key(reader_name.as_str()) {
                        self.on_reader_disconnected_locked(&mut state, reader_name, plugin.name());
                    }
                }
            }
        }
    }
}

impl CardReaderObserver for CardResourceService {
    fn on_reader_event(&self, event: &CardReaderEvent) {
        let mut state = self.state.lock().unwrap();
        if !state.started {
            return;
        }
        let Some(manager) = state.reader_managers.get(event.reader_name()).cloned() else {
            return;
        };
        match event.kind() {
            CardReaderEventKind::CardInserted | CardReaderEventKind::CardMatched => {
                debug!(
                    reader = event.reader_name(),
                    "creating card resources matching the newly inserted card"
                );
                let profile_managers = state.profile_managers.clone();
                for profile_manager in &profile_managers {
                    profile_manager.on_card_inserted(&manager);
                }
            }
            CardReaderEventKind::CardRemoved | CardReaderEventKind::Unregistered => {
                debug!(
                    reader = event.reader_name(),
                    "removing card resources after card removal or reader unregistration"
                );
                Self::on_card_removed_locked(&mut state, &manager);
            }
        }
    }
}
