//! Change notification plumbing for the custody stores.
//!
//! Every store broadcasts its full current snapshot to subscribers after each
//! committed mutation. This is an observability convenience for UI/API
//! collaborators — it is **not** part of the ledger's correctness contract,
//! and a slow or dead subscriber never blocks a commit.

pub mod bus;
pub mod in_memory_bus;

pub use bus::{ChangeBus, Subscription};
pub use in_memory_bus::InMemoryChangeBus;
