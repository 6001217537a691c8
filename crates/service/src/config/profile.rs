//! Card resource profile descriptor

use std::sync::Arc;

use cardbroker_core::{CardResourceProfileExtension, Plugin};
use regex::Regex;

use crate::error::{Error, Result};

/// Named search criterion for card resources.
///
/// A profile combines a card-matching extension with an optional plugin
/// subset, an optional reader-name filter (regular plugins) and an optional
/// reader group reference (pool plugins). Callers allocate against a
/// profile by name through
/// [`CardResourceService::get_card_resource`](crate::CardResourceService::get_card_resource).
#[derive(Clone)]
pub struct CardResourceProfile {
    name: String,
    extension: Arc<dyn CardResourceProfileExtension>,
    plugins: Vec<Arc<dyn Plugin>>,
    reader_name_regex: Option<Regex>,
    reader_group_reference: Option<String>,
}

impl CardResourceProfile {
    /// Start building a profile with its name and card-matching extension
    pub fn builder(
        name: impl Into<String>,
        extension: Arc<dyn CardResourceProfileExtension>,
    ) -> CardResourceProfileBuilder {
        CardResourceProfileBuilder {
            name: name.into(),
            extension,
            plugins: Vec::new(),
            reader_name_regex: None,
            reader_group_reference: None,
        }
    }

    /// Name of the profile
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The card-matching extension
    pub(crate) fn extension(&self) -> &Arc<dyn CardResourceProfileExtension> {
        &self.extension
    }

    /// Explicit plugin subset; empty means the service-global defaults
    pub(crate) fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// Whether `reader_name` passes the profile's reader-name filter
    pub(crate) fn accepts_reader(&self, reader_name: &str) -> bool {
        self.reader_name_regex
            .as_ref()
            .map_or(true, |regex| regex.is_match(reader_name))
    }

    /// Group reference passed to pool plugins on allocation
    pub(crate) fn reader_group_reference(&self) -> Option<&str> {
        self.reader_group_reference.as_deref()
    }
}

/// Builder for [`CardResourceProfile`].
///
/// The filter setters may be invoked at most once; a second invocation is an
/// [`Error::InvalidState`].
pub struct CardResourceProfileBuilder {
    name: String,
    extension: Arc<dyn CardResourceProfileExtension>,
    plugins: Vec<Arc<dyn Plugin>>,
    reader_name_regex: Option<Regex>,
    reader_group_reference: Option<String>,
}

impl CardResourceProfileBuilder {
    /// Restrict the profile to the given plugins, in preference order.
    ///
    /// Every plugin listed here must also be registered globally when the
    /// service is configured.
    pub fn with_plugins(mut self, plugins: Vec<Arc<dyn Plugin>>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    /// Only accept readers whose name matches `pattern`
    pub fn with_reader_name_regex(mut self, pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(Error::argument("reader name regex must not be empty"));
        }
        if self.reader_name_regex.is_some() {
            return Err(Error::state("reader name regex has already been set"));
        }
        let regex = Regex::new(pattern)
            .map_err(|e| Error::argument(format!("invalid reader name regex: {e}")))?;
        self.reader_name_regex = Some(regex);
        Ok(self)
    }

    /// Pass `group_reference` to pool plugins when allocating for this
    /// profile
    pub fn with_reader_group_reference(mut self, group_reference: impl Into<String>) -> Result<Self> {
        let group_reference = group_reference.into();
        if group_reference.is_empty() {
            return Err(Error::argument("reader group reference must not be empty"));
        }
        if self.reader_group_reference.is_some() {
            return Err(Error::state("reader group reference has already been set"));
        }
        self.reader_group_reference = Some(group_reference);
        Ok(self)
    }

    /// Freeze the profile
    pub fn build(self) -> Result<CardResourceProfile> {
        if self.name.is_empty() {
            return Err(Error::argument("profile name must not be empty"));
        }
        Ok(CardResourceProfile {
            name: self.name,
            extension: self.extension,
            plugins: self.plugins,
            reader_name_regex: self.reader_name_regex,
            reader_group_reference: self.reader_group_reference,
        })
    }
}
