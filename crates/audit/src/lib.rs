//! `custodia-audit` — append-only audit trail for every balance-affecting
//! operation.
//!
//! The log is time-ordered and bounded: past the configured capacity the
//! oldest entries are handed to an [`AuditArchive`] sink rather than silently
//! dropped. Events are immutable once recorded.

pub mod archive;
pub mod event;
pub mod export;
pub mod log;

pub use archive::{AuditArchive, InMemoryAuditArchive};
pub use event::{AuditDraft, AuditEvent, AuditEventType, AuditModule, AuditStatus};
pub use export::{export_csv, export_report};
pub use log::{AuditEventLog, AuditLogConfig};
