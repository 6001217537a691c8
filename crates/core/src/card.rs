//! Smart-card identity observed at selection time

use bytes::Bytes;

/// Identity of a smart card as observed by a selection scenario.
///
/// Two values compare equal when their power-on data are either both absent
/// or both present and byte-equal, and their select-application responses
/// are byte-equal. This is the equivalence the allocation service uses to
/// recognize that the card present in a reader is still "the same card" as
/// the one a resource was created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartCard {
    /// Data made available by the card when it was powered on, if any
    power_on_data: Option<Bytes>,

    /// Response to the application selection command
    select_application_response: Bytes,
}

impl SmartCard {
    /// Create a new smart-card identity
    pub const fn new(power_on_data: Option<Bytes>, select_application_response: Bytes) -> Self {
        Self {
            power_on_data,
            select_application_response,
        }
    }

    /// Get the power-on data, if the card provided any
    pub fn power_on_data(&self) -> Option<&[u8]> {
        self.power_on_data.as_deref()
    }

    /// Get the response to the application selection command
    pub fn select_application_response(&self) -> &[u8] {
        &self.select_application_response
    }
}
