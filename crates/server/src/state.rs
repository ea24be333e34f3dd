//! Application state shared across handlers.

use crate::service::{AuthService, ItemService};
use gophkeeper_core::config::AppConfig;
use gophkeeper_store::VaultStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Vault store backend.
    pub store: Arc<dyn VaultStore>,
    /// Authentication service.
    pub auth: Arc<AuthService>,
    /// Item service.
    pub items: Arc<ItemService>,
}

impl AppState {
    /// Create a new application state wiring services to the store.
    pub fn new(config: AppConfig, store: Arc<dyn VaultStore>) -> Self {
        let auth = Arc::new(AuthService::new(
            store.clone(),
            config.auth.sign_key.as_bytes(),
            config.auth.access_ttl(),
        ));
        let items = Arc::new(ItemService::new(store.clone(), config.server.max_batch));

        Self {
            config: Arc::new(config),
            store,
            auth,
            items,
        }
    }
}
