//! Event sinks
//!
//! Engines emit after commit; a sink must never abort the operation that
//! produced the record, so `emit` is infallible from the caller's side and
//! sinks log their own failures.

use crate::event::EventRecord;
use std::sync::Mutex;

/// Destination for emitted event records.
pub trait EventSink: Send + Sync {
    /// Accept one record
    fn emit(&self, record: EventRecord);
}

/// Sink that drops everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _record: EventRecord) {}
}

/// In-memory sink for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<EventRecord>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.lock().clone()
    }

    /// Take all records, leaving the sink empty
    pub fn drain(&self) -> Vec<EventRecord> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of records emitted so far
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing has been emitted
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<EventRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventSink for MemorySink {
    fn emit(&self, record: EventRecord) {
        self.lock().push(record);
    }
}
