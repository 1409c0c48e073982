use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use custodia_core::AccountId;
use custodia_events::{ChangeBus, InMemoryChangeBus, Subscription};
use serde::{Deserialize, Serialize};

use crate::archive::{AuditArchive, InMemoryAuditArchive};
use crate::event::{AuditDraft, AuditEvent, AuditEventType, AuditModule};

/// Live-log capacity carried over from the original system.
const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
pub struct AuditLogConfig {
    /// Maximum number of events kept in the live log before rotation.
    pub capacity: usize,
}

impl Default for AuditLogConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Serialized form of the live log (archive contents are not included).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogSnapshot {
    pub events: Vec<AuditEvent>,
}

/// Append-only, time-ordered audit log with bounded retention.
///
/// Recording never fails: a poisoned lock is recovered rather than losing the
/// trace, and rotation hands the exact evicted entries to the archive sink.
pub struct AuditEventLog {
    events: Mutex<VecDeque<AuditEvent>>,
    capacity: usize,
    archive: Arc<dyn AuditArchive>,
    bus: InMemoryChangeBus<Vec<AuditEvent>>,
}

impl AuditEventLog {
    pub fn new(config: AuditLogConfig) -> Self {
        Self::with_archive(config, Arc::new(InMemoryAuditArchive::new()))
    }

    pub fn with_archive(config: AuditLogConfig, archive: Arc<dyn AuditArchive>) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: config.capacity.max(1),
            archive,
            bus: InMemoryChangeBus::new(),
        }
    }

    /// Append one event; rotates the oldest entries into the archive when the
    /// capacity is exceeded.
    pub fn record(&self, draft: AuditDraft) -> AuditEvent {
        let event = draft.into_event();

        let snapshot = {
            let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
            events.push_back(event.clone());

            let mut evicted = Vec::new();
            while events.len() > self.capacity {
                if let Some(old) = events.pop_front() {
                    evicted.push(old);
                }
            }
            if !evicted.is_empty() {
                tracing::warn!(
                    count = evicted.len(),
                    capacity = self.capacity,
                    "audit log capacity exceeded, rotating oldest entries to archive"
                );
                self.archive.archive(evicted);
            }

            events.iter().cloned().collect::<Vec<_>>()
        };

        let _ = self.bus.publish(snapshot);
        event
    }

    /// All live events in chronological (append) order.
    pub fn events(&self) -> Vec<AuditEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.iter().cloned().collect()
    }

    pub fn events_by_module(&self, module: AuditModule) -> Vec<AuditEvent> {
        self.filtered(|e| e.module == module)
    }

    pub fn events_by_type(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.filtered(|e| e.event_type == event_type)
    }

    pub fn events_by_account(&self, account_id: AccountId) -> Vec<AuditEvent> {
        self.filtered(|e| e.account_id == Some(account_id))
    }

    pub fn events_by_reference(&self, reference: &str) -> Vec<AuditEvent> {
        self.filtered(|e| e.reference.as_deref() == Some(reference))
    }

    /// Events with `start <= timestamp <= end` (inclusive on both ends).
    pub fn events_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<AuditEvent> {
        self.filtered(|e| e.timestamp >= start && e.timestamp <= end)
    }

    /// Case-insensitive free-text search over description and reference.
    pub fn search(&self, query: &str) -> Vec<AuditEvent> {
        let needle = query.to_ascii_lowercase();
        self.filtered(|e| {
            e.description.to_ascii_lowercase().contains(&needle)
                || e.reference
                    .as_deref()
                    .is_some_and(|r| r.to_ascii_lowercase().contains(&needle))
        })
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to live-log snapshots published after each append.
    pub fn subscribe(&self) -> Subscription<Vec<AuditEvent>> {
        self.bus.subscribe()
    }

    pub fn snapshot(&self) -> AuditLogSnapshot {
        AuditLogSnapshot {
            events: self.events(),
        }
    }

    /// Rebuild a log from a snapshot; entries beyond capacity rotate out
    /// immediately, oldest first.
    pub fn restore(config: AuditLogConfig, snapshot: AuditLogSnapshot) -> Self {
        let log = Self::new(config);
        {
            let mut events = log.events.lock().unwrap_or_else(|e| e.into_inner());
            events.extend(snapshot.events);
            let mut evicted = Vec::new();
            while events.len() > log.capacity {
                if let Some(old) = events.pop_front() {
                    evicted.push(old);
                }
            }
            if !evicted.is_empty() {
                log.archive.archive(evicted);
            }
        }
        log
    }

    fn filtered(&self, pred: impl Fn(&AuditEvent) -> bool) -> Vec<AuditEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.iter().filter(|e| pred(e)).cloned().collect()
    }
}
