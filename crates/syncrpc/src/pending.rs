//! # Pending Replies
//!
//! A single-shot handoff between the thread that delivers a reply and the
//! thread that waits for it. The waiter may be a plain OS thread that cannot
//! await, so this is a capacity-1 std channel with a timed receive rather than
//! a future.
//!
//! Both halves are consumed by use: a slot is fulfilled at most once, and a
//! reply is waited on at most once.

use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::mpsc::TrySendError;
use std::time::Duration;

/// Why a wait ended without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// Nothing arrived within the timeout.
    Timeout,
    /// The slot was dropped without being fulfilled.
    Abandoned,
}

impl std::fmt::Display for WaitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "Timed out waiting for reply"),
            Self::Abandoned => write!(f, "Reply slot dropped without a value"),
        }
    }
}

impl std::error::Error for WaitError {}

/// Creates a connected slot/reply pair.
pub fn channel<T>() -> (ReplySlot<T>, PendingReply<T>) {
    let (tx, rx) = mpsc::sync_channel(1);
    (ReplySlot { tx }, PendingReply { rx })
}

/// Producer half. Held by whoever will see the reply arrive.
#[derive(Debug)]
pub struct ReplySlot<T> {
    tx: mpsc::SyncSender<T>,
}

impl<T> ReplySlot<T> {
    /// Hands the value to the waiter.
    ///
    /// Returns `false` if the waiter has already given up; the value is dropped.
    pub fn fulfill(self, value: T) -> bool {
        match self.tx.try_send(value) {
            Ok(()) => true,
            Err(TrySendError::Disconnected(_)) => false,
            // The slot is consumed on first use, so the buffer is never full.
            Err(TrySendError::Full(_)) => false,
        }
    }
}

/// Consumer half. Held by the thread that issued the call.
#[derive(Debug)]
pub struct PendingReply<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> PendingReply<T> {
    /// Blocks the current thread until the reply arrives or `timeout` elapses.
    pub fn wait(self, timeout: Duration) -> Result<T, WaitError> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Ok(value),
            Err(RecvTimeoutError::Timeout) => Err(WaitError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(WaitError::Abandoned),
        }
    }

    /// Takes the reply if it has already arrived, without blocking.
    pub fn try_take(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}
