//! Shared application state handed to handlers via `State` extraction.

use std::sync::Arc;

use crate::{services::key_service::KeyService, store::KeyStore};

#[derive(Debug, Clone)]
pub struct AppState<S> {
    pub keys: Arc<KeyService<S>>,
}

impl<S: KeyStore> AppState<S> {
    pub fn new(keys: KeyService<S>) -> Self {
        Self {
            keys: Arc::new(keys),
        }
    }
}
