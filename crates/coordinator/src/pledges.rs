//! Pledge registry: on-chain artifacts backed by confirmed reservations.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use custodia_core::{AccountId, LedgerResult, ReservationId};

/// Record of tokenized funds pledged on a network, keyed by the reservation
/// that backs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pledge {
    pub account: AccountId,
    pub reservation: ReservationId,
    pub network: String,
    /// Token or contract reference on the target network.
    pub token_reference: String,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl Pledge {
    pub fn new(
        account: AccountId,
        reservation: ReservationId,
        network: impl Into<String>,
        token_reference: impl Into<String>,
        amount: i64,
    ) -> Self {
        Self {
            account,
            reservation,
            network: network.into(),
            token_reference: token_reference.into(),
            amount,
            created_at: Utc::now(),
        }
    }
}

/// Storage seam for pledges. More than one store can be registered with the
/// coordinator (one per network in the original deployment); the in-memory
/// implementation below serves tests and the browser-resident deployment,
/// and a persistent one slots in without touching the coordinator.
pub trait PledgeStore: Send + Sync {
    /// Stable label used in cleanup reports and audit metadata.
    fn name(&self) -> &str;

    fn register(&self, pledge: Pledge);

    fn for_account(&self, account: AccountId) -> Vec<Pledge>;

    /// Remove and return every pledge tied to the account. A failure leaves
    /// the store untouched; the coordinator reports it without aborting the
    /// deletion.
    fn clear_for_account(&self, account: AccountId) -> LedgerResult<Vec<Pledge>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct InMemoryPledgeStore {
    name: String,
    pledges: RwLock<Vec<Pledge>>,
}

impl InMemoryPledgeStore {
    pub fn new() -> Self {
        Self::named("in-memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pledges: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryPledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PledgeStore for InMemoryPledgeStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, pledge: Pledge) {
        let mut pledges = self.pledges.write().unwrap_or_else(|e| e.into_inner());
        pledges.push(pledge);
    }

    fn for_account(&self, account: AccountId) -> Vec<Pledge> {
        let pledges = self.pledges.read().unwrap_or_else(|e| e.into_inner());
        pledges.iter().filter(|p| p.account == account).cloned().collect()
    }

    fn clear_for_account(&self, account: AccountId) -> LedgerResult<Vec<Pledge>> {
        let mut pledges = self.pledges.write().unwrap_or_else(|e| e.into_inner());
        let (cleared, kept): (Vec<Pledge>, Vec<Pledge>) =
            pledges.drain(..).partition(|p| p.account == account);
        *pledges = kept;
        Ok(cleared)
    }

    fn len(&self) -> usize {
        let pledges = self.pledges.read().unwrap_or_else(|e| e.into_inner());
        pledges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_removes_only_the_given_account() {
        let store = InMemoryPledgeStore::new();
        let a = AccountId::new();
        let b = AccountId::new();
        store.register(Pledge::new(a, ReservationId::new(), "Ethereum", "0xabc", 100));
        store.register(Pledge::new(b, ReservationId::new(), "Polygon", "0xdef", 200));
        store.register(Pledge::new(a, ReservationId::new(), "Ethereum", "0x123", 300));

        let cleared = store.clear_for_account(a).unwrap();
        assert_eq!(cleared.len(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.for_account(b).len(), 1);
        assert!(store.for_account(a).is_empty());
    }
}
