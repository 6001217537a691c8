//! Core traits and types for the cardbroker card-resource allocation service
//!
//! This crate defines the surface through which the allocation service talks
//! to the outside world:
//!
//! - [`SmartCard`], the card identity observed at selection time
//! - The reader and plugin capability traits ([`CardReader`], [`Plugin`],
//!   [`PoolPlugin`]) and their observable variants
//! - The observation event types ([`PluginEvent`], [`CardReaderEvent`]) and
//!   observer callbacks
//! - The caller-supplied hooks ([`CardResourceProfileExtension`],
//!   [`ReaderConfigurator`]) and the background-error handler traits
//!
//! The allocation service itself lives in the `cardbroker-service` crate;
//! everything here is implemented by plugin providers and applications.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::Bytes;

mod card;
mod error;
mod event;
mod plugin;
mod reader;
mod spi;

pub use card::SmartCard;
pub use error::PluginError;
pub use event::{CardReaderEvent, CardReaderEventKind, PluginEvent, PluginEventKind};
pub use plugin::{
    ObservablePlugin, Plugin, PluginObservationExceptionHandler, PluginObserver, PoolPlugin,
};
pub use reader::{
    CardReader, CardReaderObserver, DetectionMode, ObservableCardReader,
    ReaderObservationExceptionHandler,
};
pub use spi::{CardResourceProfileExtension, ReaderConfigurator};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        CardReader, CardReaderEvent, CardReaderEventKind, CardReaderObserver,
        CardResourceProfileExtension, DetectionMode, ObservableCardReader, ObservablePlugin,
        Plugin, PluginError, PluginEvent, PluginEventKind, PluginObserver, PoolPlugin,
        ReaderConfigurator, SmartCard,
    };
}
