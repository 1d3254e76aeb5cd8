//! # syncrpc
//!
//! Request/reply over a duplex byte transport, callable from threads that
//! cannot await.
//!
//! ## Architecture
//!
//! - `transport`: bytes in, bytes out, nothing else.
//! - `frame`: the JSON `call` / `reply` / `event` envelope.
//! - `pending`: the single-shot handoff a blocked thread waits on.
//! - `peer`: sequence numbers, the pump, and the bounded blocking call.
//! - `responder`: the answering side, for in-process remotes and tests.

use std::time::Duration;

pub mod channel;
pub mod frame;
pub mod peer;
pub mod pending;
pub mod responder;
pub mod transport;

pub use peer::Error;
pub use peer::Peer;
pub use peer::Result;

/// Default deadline for a blocking call. Long enough for a responsive remote,
/// short enough that a render thread stalled on it is not noticed.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(200);
