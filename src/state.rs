//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds only immutable configuration and shared clients. Auth state itself
//! is never shared across requests: each request builds its own cookie store
//! and guard from its headers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::cms_sync::CmsSync;
use crate::services::gating::VisibilityPolicy;
use crate::services::identity::AccountService;

/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub accounts: Arc<dyn AccountService>,
    pub cms: Arc<dyn CmsSync>,
    pub policy: Arc<VisibilityPolicy>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, accounts: Arc<dyn AccountService>, cms: Arc<dyn CmsSync>) -> Self {
        Self { config: Arc::new(config), accounts, cms, policy: Arc::new(VisibilityPolicy::standard()) }
    }
}


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
