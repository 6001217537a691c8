//! Card-resource allocation service
//!
//! A long-lived, process-wide coordinator that mediates between application
//! callers asking for "a card matching profile P" and a fluctuating
//! population of card readers: permanently attached or dynamically
//! allocated from pools, observable or not.
//!
//! ## Overview
//!
//! The service builds and maintains the set of [`CardResource`]s (a pairing
//! of reader and selected smart card) reachable from the process, hands out
//! one resource per request under a configurable allocation policy with
//! mutual exclusion across callers, and reclaims resources when cards or
//! readers vanish, while observable plugins and readers fire events
//! concurrently with allocation requests.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cardbroker_service::{
//!     provider, AllocationStrategy, CardResourceProfile, PluginsConfigurator,
//! };
//! # fn demo(
//! #     plugin: Arc<dyn cardbroker_core::Plugin>,
//! #     setup: Arc<dyn cardbroker_core::ReaderConfigurator>,
//! #     extension: Arc<dyn cardbroker_core::CardResourceProfileExtension>,
//! # ) -> cardbroker_service::Result<()> {
//! let service = provider::get_service();
//! service
//!     .configurator()
//!     .with_plugins(
//!         PluginsConfigurator::builder()
//!             .with_allocation_strategy(AllocationStrategy::Cyclic)?
//!             .with_usage_timeout(Duration::from_secs(5))?
//!             .add_plugin(plugin, setup)?
//!             .build()?,
//!     )?
//!     .with_card_resource_profiles(vec![
//!         CardResourceProfile::builder("travel-cards", extension).build()?,
//!     ])?
//!     .configure()?;
//! service.start()?;
//!
//! if let Some(resource) = service.get_card_resource("travel-cards")? {
//!     // ... use the reader through the resource ...
//!     service.release_card_resource(&resource)?;
//! }
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

mod config;
mod error;
mod profile_manager;
mod reader_manager;
mod resource;
mod service;

pub mod provider;

pub use config::{
    AllocationStrategy, CardResourceProfile, CardResourceProfileBuilder,
    CardResourceServiceConfigurator, ConfiguredPlugin, PluginsConfigurator,
    PluginsConfiguratorBuilder, PoolPluginsConfigurator, PoolPluginsConfiguratorBuilder,
};
pub use error::{Error, Result};
pub use resource::CardResource;
pub use service::CardResourceService;
