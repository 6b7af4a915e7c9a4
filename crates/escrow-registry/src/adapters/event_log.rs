//! In-memory event log.
//!
//! Implements `EventSink` by appending to a vector, so tests and the demo can
//! inspect exactly what an indexer would have seen.

use crate::domain::value_objects::Address;
use crate::events::{EscrowEvent, EventRecord};
use crate::ports::outbound::EventSink;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

/// Append-only in-memory event log.
#[derive(Default)]
pub struct InMemoryEventLog {
    records: RwLock<Vec<EventRecord>>,
}

impl InMemoryEventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records published so far, in order.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.read().clone()
    }

    /// Events emitted by `emitter`, in order.
    pub fn emitted_by(&self, emitter: Address) -> Vec<EscrowEvent> {
        self.records
            .read()
            .iter()
            .filter(|r| r.emitter == emitter)
            .map(|r| r.event.clone())
            .collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// True if nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Removes and returns every record.
    pub fn drain(&self) -> Vec<EventRecord> {
        std::mem::take(&mut *self.records.write())
    }
}

#[async_trait]
impl EventSink for InMemoryEventLog {
    async fn publish(&self, records: Vec<EventRecord>) {
        for record in &records {
            trace!(emitter = %record.emitter, event = record.event.name(), "event published");
        }
        self.records.write().extend(records);
    }
}
