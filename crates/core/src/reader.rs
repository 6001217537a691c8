//! Card reader traits and observation callbacks

use std::sync::Arc;

use crate::error::PluginError;
use crate::event::CardReaderEvent;

/// Handle on a physical card reader exposed by a plugin.
///
/// Readers are identified by name within the service; a plugin must not
/// expose two readers with the same name.
pub trait CardReader: Send + Sync {
    /// Name of the reader
    fn name(&self) -> &str;

    /// Probe the observation capability of this reader.
    ///
    /// Returns the same handle as an [`ObservableCardReader`] when the
    /// reader emits insertion/removal events. The service performs this
    /// type test once, when the reader is registered.
    fn as_observable(self: Arc<Self>) -> Option<Arc<dyn ObservableCardReader>> {
        None
    }
}

/// Card detection mode requested on an observable reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMode {
    /// Keep detecting cards after each removal
    Repeating,
    /// Stop detecting after the first card is processed
    SingleShot,
}

/// Callback invoked by an observable reader when its card state changes
pub trait CardReaderObserver: Send + Sync {
    /// Handle a reader event.
    ///
    /// Events for one reader are delivered serially, on the reader's own
    /// observation thread.
    fn on_reader_event(&self, event: &CardReaderEvent);
}

/// Receives errors raised on a reader observation thread
pub trait ReaderObservationExceptionHandler: Send + Sync {
    /// Handle an error that occurred while observing a reader
    fn on_reader_observation_error(&self, plugin_name: &str, reader_name: &str, error: PluginError);
}

/// A reader that emits [`CardReaderEvent`]s when cards are inserted or
/// removed
pub trait ObservableCardReader: CardReader {
    /// Register an observer; events are delivered until it is removed
    fn add_observer(&self, observer: Arc<dyn CardReaderObserver>);

    /// Remove a previously registered observer (matched by identity)
    fn remove_observer(&self, observer: &Arc<dyn CardReaderObserver>);

    /// Install the handler receiving observation-thread errors
    fn set_observation_exception_handler(&self, handler: Arc<dyn ReaderObservationExceptionHandler>);

    /// Start the card detection loop
    fn start_card_detection(&self, mode: DetectionMode);

    /// Stop the card detection loop
    fn stop_card_detection(&self);
}
