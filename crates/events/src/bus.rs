//! Snapshot broadcast abstraction (mechanics only).
//!
//! The bus is intentionally lightweight:
//!
//! - **Transport-agnostic**: works with in-memory channels or anything else
//!   that can fan a message out to subscribers.
//! - **Best-effort delivery**: snapshots are derived state; a missed snapshot
//!   is superseded by the next one. Subscribers that need history read the
//!   audit log instead.
//! - **No persistence**: the stores themselves are the source of truth.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to a store's snapshot stream.
///
/// Each subscription gets a copy of every snapshot published after it was
/// created (broadcast semantics). Dropping the subscription unsubscribes;
/// the publisher prunes dead receivers on the next publish.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next snapshot is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a snapshot without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a snapshot.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently queued and return the latest snapshot.
    pub fn latest(&self) -> Option<M> {
        let mut last = None;
        while let Ok(m) = self.receiver.try_recv() {
            last = Some(m);
        }
        last
    }
}

/// Store-agnostic snapshot bus (pub/sub abstraction).
///
/// `publish` is called by a store *after* its mutation has committed, so
/// subscribers only ever observe consistent states. Publish failures are
/// surfaced but never roll back the commit.
pub trait ChangeBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> ChangeBus<M> for Arc<B>
where
    B: ChangeBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
