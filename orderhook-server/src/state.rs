//! Application state shared across all request handlers.

use orderhook_core::config::SharedConfig;
use orderhook_core::ledger::Ledger;
use orderhook_core::processors::ReconciliationEngine;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Order and processed-event ledger.
    pub ledger: Ledger,
    /// Applies verified webhook events to the ledger.
    pub engine: ReconciliationEngine,
    /// Runtime configuration (can be reloaded via SIGHUP).
    pub config: SharedConfig,
}

impl AppState {
    /// Create a new AppState over the given ledger and configuration.
    pub fn new(ledger: Ledger, config: SharedConfig) -> Self {
        Self {
            engine: ReconciliationEngine::new(ledger.clone()),
            ledger,
            config,
        }
    }
}
