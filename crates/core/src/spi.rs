//! Hooks implemented by applications using the allocation service

use std::sync::Arc;

use crate::card::SmartCard;
use crate::reader::CardReader;

/// Card-matching oracle attached to a card resource profile.
///
/// Implementations typically run a card selection scenario against the
/// reader and answer with the identity of the selected card. The service
/// calls this when a reader is scanned for the profile and again when a
/// lock attempt needs to re-verify that the expected card is still present.
pub trait CardResourceProfileExtension: Send + Sync {
    /// Check whether the card currently present in `reader` matches this
    /// profile.
    ///
    /// Returns the selected card's identity, or `None` when no card is
    /// present or the present card does not match.
    fn matches(&self, reader: &Arc<dyn CardReader>) -> Option<SmartCard>;
}

/// One-time per-reader setup hook.
///
/// Invoked when a reader is first accepted by at least one card resource
/// profile; this is the only place reader-specific setup (protocol
/// activation, contactless polling parameters, ...) runs.
pub trait ReaderConfigurator: Send + Sync {
    /// Set up the reader before its first use
    fn setup_reader(&self, reader: &Arc<dyn CardReader>);
}
