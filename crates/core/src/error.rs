//! Error type for plugin operations

use thiserror::Error;

/// Error raised by a plugin while talking to its readers.
///
/// During allocation the service treats pool plugins as independent: an
/// allocation failure on one pool is logged and the next pool is tried.
/// During background observation, errors are routed to the caller-supplied
/// exception handlers instead.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin could not allocate or reach a reader
    #[error("reader allocation failed: {0}")]
    Allocation(String),

    /// Communication with the underlying device layer failed
    #[error("plugin communication failure: {0}")]
    Io(#[source] Box<dyn std::error::Error + Send + Sync>),
}
