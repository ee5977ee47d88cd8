//! Co-host delegation service - scoped, revocable management rights on listings

pub mod api;
pub mod clock;
pub mod config;
pub mod delegation;
pub mod error;
pub mod models;
pub mod notifier;
pub mod store;

use std::sync::Arc;

use crate::clock::Clock;
use crate::delegation::{DelegationManager, LedgerSettings};
use crate::notifier::Notifier;
use crate::store::Store;

/// Application state shared across handlers
pub struct AppState {
    pub manager: DelegationManager,
}

impl AppState {
    pub fn new(
        store: Store,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: LedgerSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            manager: DelegationManager::new(store, notifier, clock, settings),
        })
    }
}
