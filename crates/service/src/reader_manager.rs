//! Per-reader state machine and mutual exclusion

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cardbroker_core::{CardReader, CardResourceProfileExtension, Plugin, ReaderConfigurator};
use tracing::warn;

use crate::error::{Error, Result};
use crate::resource::CardResource;

/// Mutable part of a reader manager, serialized by its mutex.
///
/// `lock_deadline` is only meaningful while `busy`; `None` means the lock
/// never expires (infinite usage timeout).
struct ReaderManagerState {
    card_resources: Vec<Arc<CardResource>>,
    selected: Option<Arc<CardResource>>,
    busy: bool,
    active: bool,
    lock_deadline: Option<Instant>,
}

/// Manages one reader: the card resources observed on it, its activation
/// state and the single-user lock with its usage timeout.
///
/// The reader, not the card resource, is the unit of mutual exclusion: a
/// reader physically holds one card at a time. The lock is nevertheless
/// keyed by the expected resource, and a re-selection step repairs the case
/// where a different card was inserted since the resource was minted.
///
/// All state transitions go through the internal mutex; `lock`, `unlock`,
/// `matches` and `remove_card_resource` are serialized per reader.
pub(crate) struct ReaderManager {
    reader: Arc<dyn CardReader>,
    plugin: Arc<dyn Plugin>,
    reader_configurator: Option<Arc<dyn ReaderConfigurator>>,
    usage_timeout: Duration,
    state: Mutex<ReaderManagerState>,
}

impl ReaderManager {
    /// Creates a new reader manager, not active by default
    pub(crate) fn new(
        reader: Arc<dyn CardReader>,
        plugin: Arc<dyn Plugin>,
        reader_configurator: Option<Arc<dyn ReaderConfigurator>>,
        usage_timeout: Duration,
    ) -> Self {
        Self {
            reader,
            plugin,
            reader_configurator,
            usage_timeout,
            state: Mutex::new(ReaderManagerState {
                card_resources: Vec::new(),
                selected: None,
                busy: false,
                active: false,
                lock_deadline: None,
            }),
        }
    }

    /// The managed reader
    pub(crate) fn reader(&self) -> &Arc<dyn CardReader> {
        &self.reader
    }

    /// The plugin the reader belongs to
    pub(crate) fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    /// Snapshot of the card resources created for this reader
    pub(crate) fn card_resources(&self) -> Vec<Arc<CardResource>> {
        self.state.lock().unwrap().card_resources.clone()
    }

    /// Whether the reader was accepted by at least one profile manager
    pub(crate) fn is_active(&self) -> bool {
        self.state.lock().unwrap().active
    }

    /// Activates the manager; the first activation runs the reader setup
    /// hook
    pub(crate) fn activate(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.active {
            if let Some(configurator) = &self.reader_configurator {
                configurator.setup_reader(&self.reader);
            }
        }
        state.active = true;
    }

    /// Gets a new or existing card resource if the card currently inserted
    /// matches `extension`, updating the current selection.
    ///
    /// The extension runs a selection scenario on the reader, which leaves
    /// any prior logical lock meaningless; the reader is therefore always
    /// unlocked before returning so a subsequent `lock` is unambiguous.
    pub(crate) fn matches(
        &self,
        extension: &dyn CardResourceProfileExtension,
    ) -> Option<Arc<CardResource>> {
        let mut state = self.state.lock().unwrap();
        let mut resource = None;
        if let Some(smart_card) = extension.matches(&self.reader) {
            let existing = state
                .card_resources
                .iter()
                .find(|r| *r.smart_card() == smart_card)
                .cloned();
            let found = match existing {
                Some(found) => found,
                None => {
                    let created = Arc::new(CardResource::new(Arc::clone(&self.reader), smart_card));
                    state.card_resources.push(Arc::clone(&created));
                    created
                }
            };
            state.selected = Some(Arc::clone(&found));
            resource = Some(found);
        }
        state.busy = false;
        resource
    }

    /// Tries to lock the reader for `resource`.
    ///
    /// Returns `Ok(false)` when the reader is genuinely in use. A lock held
    /// past the usage timeout is forcibly reclaimed with a warning. When
    /// `resource` is not the current selection, the extension re-selects;
    /// an inequivalent result clears the selection and fails with
    /// [`Error::InvalidState`].
    pub(crate) fn lock(
        &self,
        resource: &Arc<CardResource>,
        extension: &dyn CardResourceProfileExtension,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.busy {
            if state.lock_deadline.map_or(true, |d| Instant::now() < d) {
                return Ok(false);
            }
            warn!(
                reader = self.reader.name(),
                timeout_ms = self.usage_timeout.as_millis() as u64,
                "reader automatically unlocked: usage duration exceeded the configured timeout"
            );
        }
        let is_selected = state
            .selected
            .as_ref()
            .is_some_and(|s| Arc::ptr_eq(s, resource));
        if !is_selected {
            let smart_card = extension.matches(&self.reader);
            if smart_card.as_ref() != Some(resource.smart_card()) {
                state.selected = None;
                return Err(Error::state(
                    "no card is inserted or its profile does not match the associated data",
                ));
            }
            state.selected = Some(Arc::clone(resource));
        }
        state.lock_deadline = if self.usage_timeout.is_zero() {
            None
        } else {
            Some(Instant::now() + self.usage_timeout)
        };
        state.busy = true;
        Ok(true)
    }

    /// Frees the reader. Idempotent.
    pub(crate) fn unlock(&self) {
        self.state.lock().unwrap().busy = false;
    }

    /// Removes `resource` from the manager, clearing the selection if it
    /// was selected
    pub(crate) fn remove_card_resource(&self, resource: &Arc<CardResource>) {
        let mut state = self.state.lock().unwrap();
        state.card_resources.retain(|r| !Arc::ptr_eq(r, resource));
        if state
            .selected
            .as_ref()
            .is_some_and(|s| Arc::ptr_eq(s, resource))
        {
            state.selected = None;
        }
    }
}
