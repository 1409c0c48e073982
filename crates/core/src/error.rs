//! Ledger error model.

use thiserror::Error;

use crate::id::{AccountId, ReservationId};
use crate::money::Currency;

/// Result type used across the ledger, treasury, audit and coordinator crates.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Domain-level error for balance-affecting operations.
///
/// All variants up to `Timeout` are deterministic business failures: every
/// balance check happens before any mutation, so an error here means no store
/// was touched. `Internal` covers non-domain faults (lock poisoning).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The referenced custody account does not exist (or was deleted).
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// Operation spans two currencies that must match.
    #[error("currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: Currency, actual: Currency },

    /// Zero or negative amount supplied.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// The account's available balance cannot cover the request.
    #[error("insufficient available funds: requested {requested}, available {available}")]
    InsufficientAvailableFunds { requested: i64, available: i64 },

    /// Applying the amount would push the balance past the representable
    /// range.
    #[error("balance overflow: {balance} + {amount} exceeds the representable range")]
    BalanceOverflow { balance: i64, amount: i64 },

    /// The treasury pool for the currency cannot cover the request.
    #[error("insufficient treasury funds in {currency}: requested {requested}, available {available}")]
    InsufficientTreasuryFunds {
        currency: Currency,
        requested: i64,
        available: i64,
    },

    /// The account already holds an active reservation.
    #[error("reservation conflict: account {account} has active reservation {existing}")]
    ReservationConflict {
        account: AccountId,
        existing: ReservationId,
    },

    /// The referenced reservation does not exist on the account.
    #[error("reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    /// The reservation state machine rejected the transition.
    #[error("invalid reservation transition: {from} -> {to}")]
    InvalidReservationTransition { from: String, to: String },

    /// A bounded lock acquisition expired before the store became available.
    #[error("timed out acquiring {0}")]
    Timeout(String),

    /// Non-domain fault (poisoned lock, corrupted snapshot).
    #[error("internal: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidReservationTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn timeout(what: impl Into<String>) -> Self {
        Self::Timeout(what.into())
    }
}
