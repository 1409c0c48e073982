//! Archival sink for evicted audit events.
//!
//! The live log is bounded; entries pushed past its capacity land here in
//! their original order, so nothing leaves the system invisibly.

use std::sync::Mutex;

use crate::event::AuditEvent;

/// Destination for events rotated out of the live log.
///
/// Implementations must accept every batch; archival is not allowed to refuse
/// entries (a durable implementation would buffer and retry internally).
pub trait AuditArchive: Send + Sync {
    fn archive(&self, events: Vec<AuditEvent>);

    /// Total number of events archived so far.
    fn archived_count(&self) -> usize;
}

/// In-memory archive for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditArchive {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl AuditArchive for InMemoryAuditArchive {
    fn archive(&self, mut batch: Vec<AuditEvent>) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.append(&mut batch);
    }

    fn archived_count(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
