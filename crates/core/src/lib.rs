//! `custodia-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no store implementations):
//! typed identifiers, money/currency value objects, the ledger error taxonomy,
//! and the bounded lock acquisition helper shared by the stores.

pub mod error;
pub mod id;
pub mod money;
pub mod sync;

pub use error::{LedgerError, LedgerResult};
pub use id::{AccountId, AuditEventId, OperationId, ReservationId, TransactionId};
pub use money::{Currency, checked_balance_add, ensure_positive};
pub use sync::lock_with_timeout;
