//! Optional process-wide manager instance.
//!
//! Nothing here is implicit: the gateway installs its manager at boot and
//! removes it on shutdown, and tests install their own or skip the global
//! entirely and pass a manager around by handle.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::manager::WebhookManager;

static GLOBAL: RwLock<Option<Arc<WebhookManager>>> = RwLock::new(None);

/// Install the shared instance, returning the previous one if any.
pub fn install(manager: Arc<WebhookManager>) -> Option<Arc<WebhookManager>> {
    GLOBAL.write().replace(manager)
}

pub fn get() -> Option<Arc<WebhookManager>> {
    GLOBAL.read().clone()
}

pub fn uninstall() -> Option<Arc<WebhookManager>> {
    GLOBAL.write().take()
}
