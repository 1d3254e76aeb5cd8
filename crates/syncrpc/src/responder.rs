//! # Responder
//!
//! The answering side of a bridge connection. Each inbound call is handed to
//! an async handler on its own task, so a slow answer never holds up the
//! others; a handler returning `None` leaves the call unanswered.
//!
//! Used to host the remote side in-process, and by the test suites to script
//! how the remote side behaves.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::frame::Frame;
use crate::transport::Transport;

/// A message delivered to the handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Call { method: String, args: Value },
    Event { method: String, args: Value },
}

impl Inbound {
    pub fn method(&self) -> &str {
        match self {
            Self::Call { method, .. } | Self::Event { method, .. } => method,
        }
    }

    pub fn args(&self) -> &Value {
        match self {
            Self::Call { args, .. } | Self::Event { args, .. } => args,
        }
    }
}

/// Serves one transport until it closes. Dropping the responder stops it.
pub struct Responder {
    task: JoinHandle<()>,
}

impl Responder {
    pub fn spawn<F, Fut>(runtime: &Handle, transport: Box<dyn Transport>, handler: F) -> Self
    where
        F: Fn(Inbound) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Value>> + Send + 'static,
    {
        let transport: Arc<dyn Transport> = Arc::from(transport);
        let handler = Arc::new(handler);
        let inner = runtime.clone();

        let task = runtime.spawn(async move {
            while let Ok(Some(msg)) = transport.recv().await {
                let frame = match Frame::decode(&msg) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "responder got undecodable frame");
                        continue;
                    }
                };

                match frame {
                    Frame::Call { seq, method, args } => {
                        let transport = transport.clone();
                        let handler = handler.clone();
                        inner.spawn(async move {
                            let Some(result) = (*handler)(Inbound::Call { method, args }).await else {
                                return;
                            };
                            if let Ok(payload) = Frame::reply(seq, result).encode() {
                                let _ = transport.send(&payload).await;
                            }
                        });
                    }
                    Frame::Event { method, args } => {
                        // Events are handled inline so they are observed in order.
                        (*handler)(Inbound::Event { method, args }).await;
                    }
                    Frame::Reply { .. } => {}
                }
            }
        });

        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        self.task.abort();
    }
}
