//! `custodia-ledger` — custody accounts, per-account statements, and the
//! reservation state machine.
//!
//! The `CustodyLedger` is the principal business-rule enforcer: every account
//! mutation goes through it, balances satisfy
//! `total == reserved + available` (all non-negative) at every externally
//! observable point, and at most one *active* reservation exists per account.

pub mod account;
pub mod ledger;
pub mod reservation;

pub use account::{
    AccountCategory, AccountStatus, AccountTransaction, CustodyAccount, EntryKind,
};
pub use ledger::{
    CustodyLedger, LedgerConfig, LedgerSnapshot, LedgerStats, Refund, TransferApplied,
};
pub use reservation::{Reservation, ReservationStatus, ReservationTarget};
