//! In-process transport over tokio channels.
//!
//! For embedders that run both sides of the bridge in one process, and for
//! test suites that script the remote side.

use tokio::sync::Mutex;
use tokio::sync::mpsc;

use crate::transport;
use crate::transport::Transport;

type Link = (mpsc::UnboundedSender<Vec<u8>>, mpsc::UnboundedReceiver<Vec<u8>>);

/// One end of an in-process duplex link, created with [`ChannelTransport::pair`].
///
/// When an end is dropped, its partner's `recv` yields `None` and its
/// partner's `send` fails with `ConnectionLost`.
pub struct ChannelTransport {
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
    incoming: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl ChannelTransport {
    fn from_link((outgoing, incoming): Link) -> Self {
        Self { outgoing, incoming: Mutex::new(incoming) }
    }

    /// Two connected ends: whatever `near` sends, `far` receives, and back.
    pub fn pair() -> (Self, Self) {
        let (near_to_far, far_inbox) = mpsc::unbounded_channel();
        let (far_to_near, near_inbox) = mpsc::unbounded_channel();
        let near = Self::from_link((near_to_far, near_inbox));
        let far = Self::from_link((far_to_near, far_inbox));
        (near, far)
    }
}

#[async_trait::async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        self.outgoing
            .send(payload.to_vec())
            .map_err(|_| transport::Error::ConnectionLost("other end dropped".into()))
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        Ok(self.incoming.lock().await.recv().await)
    }
}
