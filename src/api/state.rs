use std::sync::Arc;

use crate::{
    db::{MemoryStore, Store},
    services::PasswordHasher,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub hasher: PasswordHasher,
    /// Email of the account protected from demotion, banning and deletion
    pub super_admin_email: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, super_admin_email: &str) -> Self {
        Self {
            store,
            hasher: PasswordHasher::new(),
            super_admin_email: Arc::from(super_admin_email),
        }
    }

    /// State over an empty in-memory store
    pub fn in_memory(super_admin_email: &str) -> Self {
        Self::new(Arc::new(MemoryStore::new()), super_admin_email)
    }
}
