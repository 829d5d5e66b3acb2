//! In-memory ledger backend.
//!
//! Used for local development (`--memory`) and as the test double for the
//! reconciliation engine and HTTP handlers. Nothing survives a restart.

use super::{LedgerError, LedgerStore};
use crate::entities::orders::OrderRecord;
use crate::entities::processed_events::ProcessedEvent;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct MemoryState {
    orders: HashMap<String, OrderRecord>,
    /// external_order_id -> order_id
    external_index: HashMap<String, String>,
    events: HashMap<String, ProcessedEvent>,
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
    fail_order_writes: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail, as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make order writes fail while reads and event writes keep working.
    pub fn set_fail_order_writes(&self, fail: bool) {
        self.fail_order_writes.store(fail, Ordering::SeqCst);
    }

    /// Put a record in place without any uniqueness checks.
    pub fn insert_unchecked(&self, record: OrderRecord) {
        let mut state = self.state.lock();
        if let Some(external) = &record.external_order_id {
            state
                .external_index
                .insert(external.clone(), record.order_id.clone());
        }
        state.orders.insert(record.order_id.clone(), record);
    }

    pub fn event_count(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn get_event(&self, event_id: &str) -> Option<ProcessedEvent> {
        self.state.lock().events.get(event_id).cloned()
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("memory ledger offline".to_string()));
        }
        Ok(())
    }

    fn check_order_writes(&self) -> Result<(), LedgerError> {
        self.check_available()?;
        if self.fail_order_writes.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable(
                "order writes are failing".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn create_order(&self, record: OrderRecord) -> Result<bool, LedgerError> {
        self.check_order_writes()?;
        let mut state = self.state.lock();
        if state.orders.contains_key(&record.order_id) {
            return Ok(false);
        }
        if let Some(external) = &record.external_order_id {
            if state.external_index.contains_key(external) {
                return Ok(false);
            }
            state
                .external_index
                .insert(external.clone(), record.order_id.clone());
        }
        state.orders.insert(record.order_id.clone(), record);
        Ok(true)
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<OrderRecord>, LedgerError> {
        self.check_available()?;
        Ok(self.state.lock().orders.get(order_id).cloned())
    }

    async fn get_order_by_external_id(
        &self,
        external_order_id: &str,
    ) -> Result<Option<OrderRecord>, LedgerError> {
        self.check_available()?;
        let state = self.state.lock();
        Ok(state
            .external_index
            .get(external_order_id)
            .and_then(|order_id| state.orders.get(order_id))
            .cloned())
    }

    async fn replace_order(&self, record: OrderRecord) -> Result<bool, LedgerError> {
        self.check_order_writes()?;
        let mut state = self.state.lock();
        let Some(previous) = state.orders.get(&record.order_id) else {
            return Ok(false);
        };
        let previous_external = previous.external_order_id.clone();
        let created_at = previous.created_at;

        if let Some(external) = &record.external_order_id {
            match state.external_index.get(external) {
                Some(holder) if holder != &record.order_id => {
                    return Err(LedgerError::ExternalIdConflict(external.clone()));
                }
                _ => {}
            }
        }
        if let Some(old) = previous_external {
            if record.external_order_id.as_deref() != Some(old.as_str()) {
                state.external_index.remove(&old);
            }
        }
        if let Some(external) = &record.external_order_id {
            state
                .external_index
                .insert(external.clone(), record.order_id.clone());
        }

        let mut record = record;
        record.created_at = created_at;
        state.orders.insert(record.order_id.clone(), record);
        Ok(true)
    }

    async fn insert_event(&self, event: ProcessedEvent) -> Result<bool, LedgerError> {
        self.check_available()?;
        let mut state = self.state.lock();
        if state.events.contains_key(&event.event_id) {
            return Ok(false);
        }
        state.events.insert(event.event_id.clone(), event);
        Ok(true)
    }

    async fn has_processed_event(&self, event_id: &str) -> Result<bool, LedgerError> {
        self.check_available()?;
        Ok(self.state.lock().events.contains_key(event_id))
    }

    async fn remove_event(&self, event_id: &str) -> Result<(), LedgerError> {
        self.check_available()?;
        self.state.lock().events.remove(event_id);
        Ok(())
    }
}
