//! Publish/subscribe abstraction (mechanics only).
//!
//! The bus carries two kinds of traffic in this workspace:
//!
//! - **Transaction updates**: signed transactions pushed by the commerce
//!   backend for the lifetime of the process (renewals, refunds, purchases
//!   made on another device). The listener worker is the only consumer.
//! - **Entitlement changes**: notifications the store emits after it mutates
//!   owned state, so a presentation layer can re-render without polling.
//!
//! ## Delivery
//!
//! - **At-least-once**: a message may be delivered more than once; consumers
//!   must be idempotent (applying a grant or revocation twice is a no-op).
//! - **Ordered per publisher**: a single publisher's messages arrive in
//!   publish order. Across products no global order is promised.
//! - **No persistence**: the backend remains the source of truth; a missed
//!   update is recovered by the next reconcile.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// A subscription to a message stream.
///
/// Every subscription receives its own copy of every message published after
/// it was created (broadcast semantics).
///
/// ```ignore
/// let updates = feed.subscribe();
/// loop {
///     match updates.recv_timeout(Duration::from_millis(250)) {
///         Ok(signed) => store.handle_update(signed),
///         Err(RecvTimeoutError::Timeout) => continue, // check for shutdown
///         Err(RecvTimeoutError::Disconnected) => break,
///     }
/// }
/// ```
///
/// A subscription is meant to be drained by one thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Collect everything already queued without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Transport-agnostic pub/sub bus.
///
/// `publish` may fail (lock poisoning, a closed remote broker); the error is
/// surfaced to the publisher, which logs it. Implementations must be safe to
/// share between the listener thread and foreground callers.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
