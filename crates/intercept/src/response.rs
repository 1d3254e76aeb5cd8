//! What the pipeline hands back to the WebView.

use std::collections::BTreeMap;
use std::io::Read;

use crate::error::Error;

/// Response headers, one value per name. Repeated headers are joined with `,`.
pub type Headers = BTreeMap<String, String>;

/// A substitute response for a resource request.
pub struct WebResourceResponse {
    pub mime_type: String,
    pub encoding: String,
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
    pub body: Box<dyn Read + Send>,
}

impl WebResourceResponse {
    /// Drains the body.
    pub fn into_bytes(mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl std::fmt::Debug for WebResourceResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebResourceResponse")
            .field("mime_type", &self.mime_type)
            .field("encoding", &self.encoding)
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Why a request was left to the WebView's own network stack.
#[derive(Debug)]
pub enum Fallback {
    /// The client or WebView is not known to the registry.
    Unregistered,
    /// Only GET over http(s) is fetched on the page's behalf.
    Ineligible { method: String, scheme: String },
    /// The server answered with something other than 200.
    Status(u16),
    /// Neither the response nor the URL says what the body is.
    UnresolvedMime,
    Failed(Error),
}

impl std::fmt::Display for Fallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unregistered => write!(f, "instance not registered"),
            Self::Ineligible { method, scheme } => write!(f, "not eligible: {} {}", method, scheme),
            Self::Status(code) => write!(f, "upstream status {}", code),
            Self::UnresolvedMime => write!(f, "unresolved MIME type"),
            Self::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

impl From<Error> for Fallback {
    fn from(e: Error) -> Self {
        Self::Failed(e)
    }
}

/// Outcome of one interception attempt.
#[derive(Debug)]
pub enum Intercept {
    Served(WebResourceResponse),
    NotIntercepted(Fallback),
}

impl Intercept {
    /// The value for a native callback where "no response" means default handling.
    pub fn into_response(self) -> Option<WebResourceResponse> {
        match self {
            Self::Served(response) => Some(response),
            Self::NotIntercepted(_) => None,
        }
    }

    pub fn is_served(&self) -> bool {
        matches!(self, Self::Served(_))
    }

    pub fn fallback(&self) -> Option<&Fallback> {
        match self {
            Self::Served(_) => None,
            Self::NotIntercepted(fallback) => Some(fallback),
        }
    }
}
