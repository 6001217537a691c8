//! Plugin traits and observation callbacks

use std::sync::Arc;

use crate::error::PluginError;
use crate::event::PluginEvent;
use crate::reader::CardReader;

/// Provider of a set of card readers.
///
/// A regular plugin statically enumerates its readers; the population may
/// still change over time, in which case the plugin is usually also an
/// [`ObservablePlugin`]. Plugins are identified by name within the service.
pub trait Plugin: Send + Sync {
    /// Name of the plugin
    fn name(&self) -> &str;

    /// All readers currently known to the plugin
    fn readers(&self) -> Vec<Arc<dyn CardReader>>;

    /// Look up a reader by name
    fn reader(&self, name: &str) -> Option<Arc<dyn CardReader>>;

    /// Probe the observation capability of this plugin.
    ///
    /// Returns the same handle as an [`ObservablePlugin`] when the plugin
    /// emits reader connection/disconnection events. The service performs
    /// this type test once, when observation is configured.
    fn as_observable(self: Arc<Self>) -> Option<Arc<dyn ObservablePlugin>> {
        None
    }

    /// Probe the pool capability of this plugin.
    ///
    /// Returns the same handle as a [`PoolPlugin`] when the plugin hands
    /// out readers dynamically instead of enumerating them.
    fn as_pool(self: Arc<Self>) -> Option<Arc<dyn PoolPlugin>> {
        None
    }
}

/// Callback invoked by an observable plugin when its reader population
/// changes
pub trait PluginObserver: Send + Sync {
    /// Handle a plugin event.
    ///
    /// Events for one plugin are delivered serially, on the plugin's own
    /// observation thread.
    fn on_plugin_event(&self, event: &PluginEvent);
}

/// Receives errors raised on a plugin observation thread
pub trait PluginObservationExceptionHandler: Send + Sync {
    /// Handle an error that occurred while observing a plugin
    fn on_plugin_observation_error(&self, plugin_name: &str, error: PluginError);
}

/// A plugin that emits [`PluginEvent`]s when readers appear or disappear
pub trait ObservablePlugin: Plugin {
    /// Register an observer; events are delivered until it is removed
    fn add_observer(&self, observer: Arc<dyn PluginObserver>);

    /// Remove a previously registered observer (matched by identity)
    fn remove_observer(&self, observer: &Arc<dyn PluginObserver>);

    /// Install the handler receiving observation-thread errors
    fn set_observation_exception_handler(&self, handler: Arc<dyn PluginObservationExceptionHandler>);
}

/// A plugin that allocates readers on demand from a pool.
///
/// Pool readers are exclusive by construction: a reader returned by
/// [`allocate_reader`](Self::allocate_reader) is dedicated to the caller
/// until it is passed back to [`release_reader`](Self::release_reader).
pub trait PoolPlugin: Plugin {
    /// Allocate a reader from the pool identified by `group_reference`.
    ///
    /// Returns `Ok(None)` when the pool has no reader available for the
    /// group.
    fn allocate_reader(
        &self,
        group_reference: Option<&str>,
    ) -> Result<Option<Arc<dyn CardReader>>, PluginError>;

    /// Give a previously allocated reader back to the pool
    fn release_reader(&self, reader: &Arc<dyn CardReader>);
}
