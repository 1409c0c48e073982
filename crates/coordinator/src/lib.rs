//! `custodia-coordinator` — multi-store operations.
//!
//! The `TransferCoordinator` owns every workflow that touches more than one
//! store in a single logical step: account-to-account transfers (ledger +
//! audit, correlated events) and account decommissioning (ledger + pledge
//! registry + audit). Callers supply an `OperationId`; retrying a completed
//! operation replays the stored outcome instead of re-executing it.

pub mod coordinator;
pub mod pledges;

pub use coordinator::{
    DeletionReport, OperationOutcome, PledgeCleanupError, TransferCoordinator, TransferReceipt,
};
pub use pledges::{InMemoryPledgeStore, Pledge, PledgeStore};
