// handlers/state.rs - shared handler state

use std::sync::Arc;

use crate::database::repository::Store;
use crate::services::SignupService;
use crate::testing::{Clock, SystemClock};

/// Everything a handler needs, cloned per request by axum
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub signup: SignupService,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self {
            signup: SignupService::new(store.clone()),
            store,
            clock,
        }
    }
}
