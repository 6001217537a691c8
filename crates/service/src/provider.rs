//! Process-wide access to the card resource service

use std::sync::{Arc, OnceLock};

use crate::service::CardResourceService;

static SERVICE: OnceLock<Arc<CardResourceService>> = OnceLock::new();

/// Get the process-wide card resource service.
///
/// The service is created lazily on first access; every subsequent call
/// returns the same handle. Stopping the service resets its state but never
/// invalidates the handle.
///
/// Embedders that prefer owning their instance (several independent
/// services, test isolation) can use [`CardResourceService::new`] directly.
pub fn get_service() -> Arc<CardResourceService> {
    Arc::clone(SERVICE.get_or_init(CardResourceService::new))
}
