//! Observation events delivered by plugins and readers

/// Kind of a plugin-level event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginEventKind {
    /// One or more readers appeared on the plugin
    ReaderConnected,
    /// One or more readers disappeared from the plugin
    ReaderDisconnected,
}

/// Event delivered by an observable plugin when its reader population
/// changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEvent {
    plugin_name: String,
    reader_names: Vec<String>,
    kind: PluginEventKind,
}

impl PluginEvent {
    /// Create a new plugin event
    pub fn new(
        plugin_name: impl Into<String>,
        reader_names: Vec<String>,
        kind: PluginEventKind,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            reader_names,
            kind,
        }
    }

    /// Name of the plugin the event originates from
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Names of the readers concerned by the event
    pub fn reader_names(&self) -> &[String] {
        &self.reader_names
    }

    /// Kind of the event
    pub const fn kind(&self) -> PluginEventKind {
        self.kind
    }
}

/// Kind of a reader-level event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardReaderEventKind {
    /// A card was inserted into the reader
    CardInserted,
    /// A card was inserted and matched a running selection scenario
    CardMatched,
    /// The card was removed from the reader
    CardRemoved,
    /// The reader was unregistered from its plugin
    Unregistered,
}

/// Event delivered by an observable reader when its card state changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardReaderEvent {
    reader_name: String,
    kind: CardReaderEventKind,
}

impl CardReaderEvent {
    /// Create a new reader event
    pub fn new(reader_name: impl Into<String>, kind: CardReaderEventKind) -> Self {
        Self {
            reader_name: reader_name.into(),
            kind,
        }
    }

    /// Name of the reader the event originates from
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    /// Kind of the event
    pub const fn kind(&self) -> CardReaderEventKind {
        self.kind
    }
}
