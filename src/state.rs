//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the presence updater (which owns the record store) and the
//! startup config. Clone is required by Axum; every field is cheap to clone.

use std::sync::Arc;

use crate::config::Config;
use crate::services::presence::PresenceUpdater;
use crate::store::RecordStore;

#[derive(Clone)]
pub struct AppState {
    pub presence: PresenceUpdater,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, config: Config) -> Self {
        Self { presence: PresenceUpdater::new(store), config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
