//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes facts after the stock mutation has been committed.
//! Delivery is at-least-once and unordered across publishers, so consumers
//! must be idempotent (the envelope's `event_id` and `ledger_version` make
//! de-duplication possible). A failed publish never rolls back the mutation
//! that produced the event.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

/// Receiving side of a bus subscription (broadcast: every subscriber sees
/// every published message).
///
/// Intended for a single consuming thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Transport-agnostic pub/sub contract.
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

/// Bus that accepts and discards every message.
///
/// Used when no notification consumer is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventBus;

impl<M: Send + 'static> EventBus<M> for NullEventBus {
    type Error = core::convert::Infallible;

    fn publish(&self, _message: M) -> Result<(), Self::Error> {
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        // Sender dropped immediately: the subscription reports disconnection.
        let (_tx, rx) = mpsc::channel();
        Subscription::new(rx)
    }
}
