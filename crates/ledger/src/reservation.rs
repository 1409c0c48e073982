//! Reservation lifecycle.
//!
//! States: `{Reserved, Confirmed, Released, Completed}`; initial `Reserved`;
//! terminal `{Released, Completed}`. Banking-classified accounts start
//! directly in `Confirmed` — that rule lives here, in the state machine, so
//! it holds regardless of which caller creates the reservation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use custodia_core::{LedgerError, LedgerResult, ReservationId};

use crate::account::AccountCategory;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Reserved,
    Confirmed,
    Released,
    Completed,
}

impl ReservationStatus {
    /// Reserved and Confirmed reservations still hold funds and block new
    /// reservations on the account.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Reserved | Self::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Released | Self::Completed)
    }

    /// Allowed transitions:
    /// `Reserved -> Confirmed`, `Reserved -> Released`,
    /// `Confirmed -> Released`, `Confirmed -> Completed`.
    pub fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Reserved, Self::Confirmed)
                | (Self::Reserved, Self::Released)
                | (Self::Confirmed, Self::Released)
                | (Self::Confirmed, Self::Completed)
        )
    }

    /// Initial state for a newly created reservation on an account of the
    /// given classification. Banking accounts auto-confirm.
    pub fn initial_for(category: AccountCategory) -> Self {
        match category {
            AccountCategory::Blockchain => Self::Reserved,
            AccountCategory::Banking => Self::Confirmed,
        }
    }
}

impl core::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Reserved => "reserved",
            Self::Confirmed => "confirmed",
            Self::Released => "released",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// What the held funds are earmarked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReservationTarget {
    /// Funds backing a token issuance on a blockchain.
    Tokenization {
        network: String,
        contract_address: Option<String>,
        token_amount: Option<i64>,
    },
    /// Funds earmarked for an outgoing transfer.
    Transfer {
        destination: String,
        reference: Option<String>,
    },
}

impl ReservationTarget {
    /// Short label used in audit descriptions.
    pub fn summary(&self) -> String {
        match self {
            Self::Tokenization { network, .. } => format!("tokenization on {network}"),
            Self::Transfer { destination, .. } => format!("transfer to {destination}"),
        }
    }
}

/// A temporary, stateful hold on part of an account's available balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub amount: i64,
    pub target: ReservationTarget,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(amount: i64, target: ReservationTarget, category: AccountCategory) -> Self {
        let now = Utc::now();
        Self {
            id: ReservationId::new(),
            amount,
            target,
            status: ReservationStatus::initial_for(category),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a transition, rejecting anything the state machine disallows.
    pub fn transition(&mut self, to: ReservationStatus) -> LedgerResult<()> {
        if !self.status.can_transition(to) {
            return Err(LedgerError::invalid_transition(
                self.status.to_string(),
                to.to_string(),
            ));
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_statuses() -> [ReservationStatus; 4] {
        [
            ReservationStatus::Reserved,
            ReservationStatus::Confirmed,
            ReservationStatus::Released,
            ReservationStatus::Completed,
        ]
    }

    #[test]
    fn terminal_states_admit_no_transition() {
        for terminal in [ReservationStatus::Released, ReservationStatus::Completed] {
            for to in all_statuses() {
                assert!(!terminal.can_transition(to), "{terminal} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn reserved_cannot_complete_directly() {
        assert!(!ReservationStatus::Reserved.can_transition(ReservationStatus::Completed));
    }

    #[test]
    fn banking_reservations_start_confirmed() {
        let target = ReservationTarget::Transfer {
            destination: "DE89 3704 0044 0532 0130 00".to_string(),
            reference: None,
        };
        let banking = Reservation::new(100, target.clone(), AccountCategory::Banking);
        assert_eq!(banking.status, ReservationStatus::Confirmed);

        let chain = Reservation::new(100, target, AccountCategory::Blockchain);
        assert_eq!(chain.status, ReservationStatus::Reserved);
    }

    #[test]
    fn released_reservation_cannot_be_reconfirmed() {
        let mut r = Reservation::new(
            50,
            ReservationTarget::Tokenization {
                network: "Ethereum".to_string(),
                contract_address: None,
                token_amount: None,
            },
            AccountCategory::Blockchain,
        );
        r.transition(ReservationStatus::Released).unwrap();

        let err = r.transition(ReservationStatus::Confirmed).unwrap_err();
        assert_eq!(
            err,
            LedgerError::invalid_transition("released", "confirmed")
        );
    }

    #[test]
    fn confirm_then_complete_is_the_happy_path() {
        let mut r = Reservation::new(
            50,
            ReservationTarget::Tokenization {
                network: "Polygon".to_string(),
                contract_address: Some("0xABC".to_string()),
                token_amount: Some(50),
            },
            AccountCategory::Blockchain,
        );
        r.transition(ReservationStatus::Confirmed).unwrap();
        r.transition(ReservationStatus::Completed).unwrap();
        assert!(r.status.is_terminal());
    }
}
