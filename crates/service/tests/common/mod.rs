//! Mock plugins, readers and profile extensions shared by the integration
//! tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use cardbroker_core::{
    CardReader, CardReaderEvent, CardReaderEventKind, CardReaderObserver,
    CardResourceProfileExtension, DetectionMode, ObservableCardReader, ObservablePlugin, Plugin,
    PluginError, PluginEvent, PluginEventKind, PluginObservationExceptionHandler, PluginObserver,
    PoolPlugin, ReaderConfigurator, ReaderObservationExceptionHandler, SmartCard,
};

/// Build a card identity from a hex select-application response
pub fn card(select_response: &str) -> SmartCard {
    SmartCard::new(None, Bytes::from(hex::decode(select_response).unwrap()))
}

/// Shared "which card sits in which reader" table.
///
/// Readers and extensions both consult it, which stands in for the physical
/// card slot without the mocks having to know each other.
#[derive(Clone, Default)]
pub struct CardTable {
    cards: Arc<Mutex<HashMap<String, SmartCard>>>,
}

impl CardTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, reader_name: &str, card: SmartCard) {
        self.cards
            .lock()
            .unwrap()
            .insert(reader_name.to_string(), card);
    }

    pub fn remove(&self, reader_name: &str) {
        self.cards.lock().unwrap().remove(reader_name);
    }

    pub fn card(&self, reader_name: &str) -> Option<SmartCard> {
        self.cards.lock().unwrap().get(reader_name).cloned()
    }
}

/// Extension matching any card present in the reader's slot, optionally
/// restricted to one select-application response
pub struct ProfileMatcher {
    cards: CardTable,
    select_response: Option<Bytes>,
}

impl ProfileMatcher {
    pub fn any(cards: &CardTable) -> Arc<Self> {
        Arc::new(Self {
            cards: cards.clone(),
            select_response: None,
        })
    }

    pub fn expecting(cards: &CardTable, select_response: &str) -> Arc<Self> {
        Arc::new(Self {
            cards: cards.clone(),
            select_response: Some(Bytes::from(hex::decode(select_response).unwrap())),
        })
    }
}

impl CardResourceProfileExtension for ProfileMatcher {
    fn matches(&self, reader: &Arc<dyn CardReader>) -> Option<SmartCard> {
        let card = self.cards.card(reader.name())?;
        match &self.select_response {
            Some(expected) if card.select_application_response() != &expected[..] => None,
            _ => Some(card),
        }
    }
}

/// Reader configurator counting its invocations
#[derive(Default)]
pub struct SetupRecorder {
    count: AtomicUsize,
}

impl SetupRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl ReaderConfigurator for SetupRecorder {
    fn setup_reader(&self, _reader: &Arc<dyn CardReader>) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct NoopPluginHandler;

impl PluginObservationExceptionHandler for NoopPluginHandler {
    fn on_plugin_observation_error(&self, _plugin_name: &str, _error: PluginError) {}
}

pub struct NoopReaderHandler;

impl ReaderObservationExceptionHandler for NoopReaderHandler {
    fn on_reader_observation_error(
        &self,
        _plugin_name: &str,
        _reader_name: &str,
        _error: PluginError,
    ) {
    }
}

/// Plain, non-observable reader
pub struct MockReader {
    name: String,
}

impl MockReader {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
        })
    }
}

impl CardReader for MockReader {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Observable reader delivering events synchronously to its observers
pub struct MockObservableReader {
    name: String,
    observers: Mutex<Vec<Arc<dyn CardReaderObserver>>>,
    detecting: AtomicBool,
}

impl MockObservableReader {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            observers: Mutex::new(Vec::new()),
            detecting: AtomicBool::new(false),
        })
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().unwrap().len()
    }

    pub fn is_detecting(&self) -> bool {
        self.detecting.load(Ordering::SeqCst)
    }

    pub fn emit(&self, kind: CardReaderEventKind) {
        let event = CardReaderEvent::new(self.name.clone(), kind);
        let observers = self.observers.lock().unwrap().clone();
        for observer in observers {
            observer.on_reader_event(&event);
        }
    }
}

impl CardReader for MockObservableReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_observable(self: Arc<Self>) -> Option<Arc<dyn ObservableCardReader>> {
        Some(self)
    }
}

impl ObservableCardReader for MockObservableReader {
    fn add_observer(&self, observer: Arc<dyn CardReaderObserver>) {
        self.observers.lock().unwrap().push(observer);
    }

    fn remove_observer(&self, observer: &Arc<dyn CardReaderObserver>) {
        self.observers
            .lock()
            .unwrap()
            .retain(|o| !Arc::ptr_eq(o, observer));
    }

    fn set_observation_exception_handler(
        &self,
        _handler: Arc<dyn ReaderObservationExceptionHandler>,
    ) {
    }

    fn start_card_detection(&self, _mode: DetectionMode) {
        self.detecting.store(true, Ordering::SeqCst);
    }

    fn stop_card_detection(&self) {
        self.detecting.store(false, Ordering::SeqCst);
    }
}

/// Plain regular plugin with a fixed reader population
pub struct MockPlugin {
    name: String,
    readers: Mutex<Vec<Arc<dyn CardReader>>>,
}

impl MockPlugin {
    pub fn new(name: &str, readers: Vec<Arc<dyn CardReader>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            readers: Mutex::new(readers),
        })
    }
}

impl Plugin for MockPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn readers(&self) -> Vec<Arc<dyn CardReader>> {
        self.readers.lock().unwrap().clone()
    }

    fn reader(&self, name: &str) -> Option<Arc<dyn CardReader>> {
        self.readers
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.name() == name)
            .cloned()
    }
}

/// Observable plugin delivering events synchronously to its observers
pub struct MockObservablePlugin {
    name: String,
    readers: Mutex<Vec<Arc<dyn CardReader>>>,
    observers: Mutex<Vec<Arc<dyn PluginObserver>>>,
}

impl MockObservablePlugin {
    pub fn new(name: &str, readers: Vec<Arc<dyn CardReader>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            readers: Mutex::new(readers),
            observers: Mutex::new(Vec::new()),
        })
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().unwrap().len()
    }

    /// Attach a reader and notify observers, as a hot-plug would
    pub fn connect_reader(&self, reader: Arc<dyn CardReader>) {
        let reader_name = reader.name().to_string();
        self.readers.lock().unwrap().push(reader);
        self.notify(vec![reader_name], PluginEventKind::ReaderConnected);
    }

    /// Detach a reader and notify observers
    pub fn disconnect_reader(&self, reader_name: &str) {
        self.readers
            .lock()
            .unwrap()
            .retain(|r| r.name() != reader_name);
        self.notify(
            vec![reader_name.to_string()],
            PluginEventKind::ReaderDisconnected,
        );
    }

    fn notify(&self, reader_names: Vec<String>, kind: PluginEventKind) {
        let event = PluginEvent::new(self.name.clone(), reader_names, kind);
        let observers = self.observers.lock().unwrap().clone();
        for observer in observers {
            observer.on_plugin_event(&event);
        }
    }
}

impl Plugin for MockObservablePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn readers(&self) -> Vec<Arc<dyn CardReader>> {
        self.readers.lock().unwrap().clone()
    }

    fn reader(&self, name: &str) -> Option<Arc<dyn CardReader>> {
        self.readers
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.name() == name)
            .cloned()
    }

    fn as_observable(self: Arc<Self>) -> Option<Arc<dyn ObservablePlugin>> {
        Some(self)
    }
}

impl ObservablePlugin for MockObservablePlugin {
    fn add_observer(&self, observer: Arc<dyn PluginObserver>) {
        self.observers.lock().unwrap().push(observer);
    }

    fn remove_observer(&self, observer: &Arc<dyn PluginObserver>) {
        self.observers
            .lock()
            .unwrap()
            .retain(|o| !Arc::ptr_eq(o, observer));
    }

    fn set_observation_exception_handler(
        &self,
        _handler: Arc<dyn PluginObservationExceptionHandler>,
    ) {
    }
}

/// Pool plugin handing out readers from a queue
pub struct MockPoolPlugin {
    name: String,
    available: Mutex<Vec<Arc<dyn CardReader>>>,
    released: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MockPoolPlugin {
    pub fn new(name: &str, available: Vec<Arc<dyn CardReader>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            available: Mutex::new(available),
            released: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        })
    }

    /// Make every allocation attempt fail with a plugin error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Add a reader to the pool after construction
    pub fn offer_reader(&self, reader: Arc<dyn CardReader>) {
        self.available.lock().unwrap().push(reader);
    }

    /// Names of the readers given back so far, in order
    pub fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }
}

impl Plugin for MockPoolPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn readers(&self) -> Vec<Arc<dyn CardReader>> {
        self.available.lock().unwrap().clone()
    }

    fn reader(&self, name: &str) -> Option<Arc<dyn CardReader>> {
        self.available
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.name() == name)
            .cloned()
    }

    fn as_pool(self: Arc<Self>) -> Option<Arc<dyn PoolPlugin>> {
        Some(self)
    }
}

impl PoolPlugin for MockPoolPlugin {
    fn allocate_reader(
        &self,
        _group_reference: Option<&str>,
    ) -> Result<Option<Arc<dyn CardReader>>, PluginError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PluginError::Allocation("pool offline".to_string()));
        }
        let mut available = self.available.lock().unwrap();
        if available.is_empty() {
            return Ok(None);
        }
        Ok(Some(available.remove(0)))
    }

    fn release_reader(&self, reader: &Arc<dyn CardReader>) {
        self.released.lock().unwrap().push(reader.name().to_string());
        self.available.lock().unwrap().push(Arc::clone(reader));
    }
}
