//! Card resource handed out to callers

use std::fmt;
use std::sync::Arc;

use cardbroker_core::{CardReader, SmartCard};

/// Pairing of a reader and the smart card selected in it.
///
/// A card resource represents exclusive use of one physical reader; it is
/// handed out to at most one caller at a time and must be given back with
/// [`CardResourceService::release_card_resource`](crate::CardResourceService::release_card_resource).
///
/// Resources are identified by pointer, not by value: two resources minted
/// through distinct plugin paths stay distinct even when their underlying
/// cards are equivalent. Compare handles with [`Arc::ptr_eq`].
pub struct CardResource {
    reader: Arc<dyn CardReader>,
    smart_card: SmartCard,
}

impl CardResource {
    /// Create a new card resource. Both parts are fixed for the life of the
    /// resource.
    pub fn new(reader: Arc<dyn CardReader>, smart_card: SmartCard) -> Self {
        Self { reader, smart_card }
    }

    /// The reader the card was selected in
    pub fn reader(&self) -> &Arc<dyn CardReader> {
        &self.reader
    }

    /// Identity of the selected smart card
    pub fn smart_card(&self) -> &SmartCard {
        &self.smart_card
    }
}

impl fmt::Debug for CardResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardResource")
            .field("ptr", &(self as *const Self))
            .field("reader", &self.reader.name())
            .finish()
    }
}
