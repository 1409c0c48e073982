use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use custodia_core::{AccountId, Currency, TransactionId};

use crate::reservation::Reservation;

/// Account classification. Affects reservation auto-confirmation and the
/// account-number prefix.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountCategory {
    Blockchain,
    Banking,
}

impl AccountCategory {
    /// Account-number prefix: BC = blockchain custody, BK = banking.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Blockchain => "BC",
            Self::Banking => "BK",
        }
    }
}

/// Lifecycle status. Accounts start `Pending` and flip to `Active` when their
/// first reservation is confirmed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Pending,
    Active,
}

/// Direction of a statement entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Credit,
    Debit,
}

/// Per-account statement record, independent of the global audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTransaction {
    pub id: TransactionId,
    pub timestamp: DateTime<Utc>,
    pub entry: EntryKind,
    /// Counterparty / purpose description.
    pub description: String,
    pub reference: Option<String>,
    pub amount: i64,
    /// Total balance after this entry was applied.
    pub balance_after: i64,
}

/// A custody account holding a pooled-currency balance split into reserved
/// and available portions.
///
/// Invariant at every externally observable point:
/// `total_balance == reserved_balance + available_balance`, all non-negative.
/// Owned exclusively by [`crate::CustodyLedger`]; mutated only through its
/// operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyAccount {
    pub id: AccountId,
    /// Sequential human account number, e.g. `CST-BC-USD-1000001`.
    pub account_number: String,
    pub category: AccountCategory,
    pub currency: Currency,
    pub total_balance: i64,
    pub reserved_balance: i64,
    pub available_balance: i64,
    pub status: AccountStatus,
    pub reservations: Vec<Reservation>,
    pub transactions: Vec<AccountTransaction>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl CustodyAccount {
    pub fn new(
        account_number: String,
        category: AccountCategory,
        currency: Currency,
        opening_balance: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            account_number,
            category,
            currency,
            total_balance: opening_balance,
            reserved_balance: 0,
            available_balance: opening_balance,
            status: AccountStatus::Pending,
            reservations: Vec::new(),
            transactions: Vec::new(),
            created_at: now,
            last_updated: now,
        }
    }

    /// The balance-split invariant. Checked in debug builds after every
    /// mutation and exercised heavily by property tests.
    pub fn invariant_holds(&self) -> bool {
        self.total_balance == self.reserved_balance + self.available_balance
            && self.total_balance >= 0
            && self.reserved_balance >= 0
            && self.available_balance >= 0
    }

    /// The at-most-one active reservation, if any.
    pub fn active_reservation(&self) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.status.is_active())
    }

    pub fn reservation_mut(
        &mut self,
        id: custodia_core::ReservationId,
    ) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == id)
    }

    /// Append a statement entry, keeping only the most recent `cap` entries.
    pub fn push_transaction(&mut self, entry: AccountTransaction, cap: usize) {
        self.transactions.push(entry);
        if self.transactions.len() > cap {
            let overflow = self.transactions.len() - cap;
            self.transactions.drain(..overflow);
        }
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd() -> Currency {
        Currency::new("USD").unwrap()
    }

    fn entry(n: i64) -> AccountTransaction {
        AccountTransaction {
            id: TransactionId::new(),
            timestamp: Utc::now(),
            entry: EntryKind::Credit,
            description: format!("entry {n}"),
            reference: None,
            amount: n,
            balance_after: n,
        }
    }

    #[test]
    fn new_account_satisfies_invariant() {
        let account = CustodyAccount::new(
            "CST-BC-USD-1000001".to_string(),
            AccountCategory::Blockchain,
            usd(),
            1_000,
        );
        assert!(account.invariant_holds());
        assert_eq!(account.available_balance, 1_000);
        assert_eq!(account.reserved_balance, 0);
        assert_eq!(account.status, AccountStatus::Pending);
    }

    #[test]
    fn statement_cap_keeps_most_recent_entries() {
        let mut account = CustodyAccount::new(
            "CST-BK-EUR-1000001".to_string(),
            AccountCategory::Banking,
            Currency::new("EUR").unwrap(),
            0,
        );
        for n in 0..10 {
            account.push_transaction(entry(n), 4);
        }
        assert_eq!(account.transactions.len(), 4);
        assert_eq!(account.transactions[0].description, "entry 6");
        assert_eq!(account.transactions[3].description, "entry 9");
    }
}
