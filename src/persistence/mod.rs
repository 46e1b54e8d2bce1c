//! Order record persistence.
//!
//! The engine writes an order record after every successful broker
//! submission, fire-and-forget: persistence failures are logged and
//! never propagated to the submitter.

pub mod postgres;

use async_trait::async_trait;
use std::sync::Mutex;

use crate::domain::OrderRecord;
use crate::error::Result;

pub use postgres::PostgresOrderStore;

/// Capability for persisting order records.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn record_order(&self, record: &OrderRecord) -> Result<()>;
}

/// In-memory store for tests and paper trading.
#[derive(Default)]
pub struct MemoryOrderStore {
    records: Mutex<Vec<OrderRecord>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<OrderRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn record_order(&self, record: &OrderRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
