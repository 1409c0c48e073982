//! `custodia-treasury` — the pooled, unallocated funds per currency.
//!
//! Custody accounts are funded from this pool and return funds to it on
//! deletion/withdrawal. `deposit`/`withdraw` form the external system
//! boundary; `debit`/`credit` are internal funding/return paths whose audit
//! trail is written by the caller with the operation's correlation reference.

pub mod treasury;

pub use treasury::{TreasuryBalance, TreasuryConfig, TreasuryLedger, TreasuryMovement, TreasurySnapshot};
