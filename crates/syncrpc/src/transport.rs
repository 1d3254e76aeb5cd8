//! # Transport Abstraction
//!
//! A minimal, async interface for moving bytes across the bridge.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: The Transport knows nothing about frames or JSON.
//!   It moves opaque buffers.
//! - **Duplex**: Sending and receiving are independent. Request/reply
//!   correlation is built on top of this by the peer, not defined here.

use std::fmt;

/// Errors that occur at the transport layer.
#[derive(Debug, Clone)]
pub enum Error {
    /// The other side is unreachable or the connection was dropped.
    ConnectionLost(String),
    /// The other side rejected the payload size.
    PayloadTooLarge,
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::PayloadTooLarge => write!(f, "Payload too large for transport"),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// A duplex byte pipe to the remote side of the bridge.
///
/// This trait is object-safe (`Arc<dyn Transport>`).
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Queues one message for delivery.
    async fn send(&self, payload: &[u8]) -> Result<()>;

    /// Waits for the next inbound message.
    ///
    /// Returns `Ok(None)` once the stream is closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>>;
}
