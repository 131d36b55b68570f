//! crates/logging-sink/src/memory.rs
//! Handler keeping published records in memory.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::handler::{Handler, HandlerCore};
use crate::record::Record;

/// Collects every accepted record.
///
/// Used to capture output in tests and wherever records need inspection
/// instead of emission.
#[derive(Default)]
pub struct MemoryHandler {
    core: HandlerCore,
    records: Mutex<Vec<Record>>,
}

impl MemoryHandler {
    /// Creates an empty handler accepting every level.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the captured records.
    pub fn records(&self) -> Vec<Record> {
        self.lock().clone()
    }

    /// Returns the captured messages.
    pub fn messages(&self) -> Vec<String> {
        self.lock()
            .iter()
            .map(|record| record.message().to_owned())
            .collect()
    }

    /// Returns the captured records rendered with the handler's formatter.
    pub fn formatted(&self) -> Vec<String> {
        self.lock()
            .iter()
            .map(|record| self.core.format(record))
            .collect()
    }

    /// Number of captured records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Reports whether nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Discards captured records.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Handler for MemoryHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn publish(&self, record: &Record) {
        if self.core.is_loggable(record) {
            self.lock().push(record.clone());
        }
    }

    fn flush(&self) {}

    fn close(&self) {
        self.core.mark_closed();
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

impl fmt::Debug for MemoryHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHandler")
            .field("records", &self.len())
            .field("core", &self.core)
            .finish()
    }
}
