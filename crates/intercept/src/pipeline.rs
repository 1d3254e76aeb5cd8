//! # Interception Pipeline
//!
//! Decides, for one resource request, between serving a file the remote side
//! already has, fetching (and possibly caching) the resource ourselves, or
//! leaving the request to the WebView.
//!
//! ## Flow
//!
//! 1. Ask the remote side, with a bounded wait. No answer is "no decision".
//! 2. A complete decision naming an existing file is served as is.
//! 3. Only GET over http(s) goes further.
//! 4. Fetch, propagating cookies and the page's headers.
//! 5. Anything but a 200 with a known MIME type falls back.
//! 6. Unless the decision named a file that exists, store the body, report
//!    the new file, and serve the stored copy.
//!
//! Every failure ends in `Intercept::NotIntercepted` with its reason.

use std::fs::File;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use instances::BridgeId;
use serde_json::Value;
use serde_json::json;
use syncrpc::Peer;
use tracing::debug;
use tracing::warn;
use url::Url;

use crate::cache::OfflineCache;
use crate::config::InterceptConfig;
use crate::cookies::CookieStore;
use crate::cookies::NoCookies;
use crate::decision::InterceptDecision;
use crate::error::Error;
use crate::error::Result;
use crate::fetch;
use crate::fetch::FetchResult;
use crate::fetch::Fetcher;
use crate::request::InterceptRequest;
use crate::response::Fallback;
use crate::response::Headers;
use crate::response::Intercept;
use crate::response::WebResourceResponse;

/// Asks the remote side for a decision.
pub const SHOULD_INTERCEPT: &str = "shouldIntercept";
/// Tells the remote side a fetched body is stored and ready.
pub const INTERCEPT_COMPLETE: &str = "onInterceptComplete";

const CORS_HEADERS: [(&str, &str); 4] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-credentials", "true"),
    ("access-control-allow-methods", "GET POST OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

/// Bridge ids of the objects a callback came from, sent along with every
/// message so the remote side can find its counterparts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallerIds {
    pub client: Option<BridgeId>,
    pub web_view: Option<BridgeId>,
}

impl CallerIds {
    pub fn new(client: BridgeId, web_view: BridgeId) -> Self {
        Self { client: Some(client), web_view: Some(web_view) }
    }

    pub(crate) fn annotate(&self, mut args: Value) -> Value {
        if let Value::Object(map) = &mut args {
            map.insert("clientId".into(), json!(self.client.map(|id| id.0)));
            map.insert("webViewId".into(), json!(self.web_view.map(|id| id.0)));
        }
        args
    }
}

pub struct Interceptor {
    peer: Arc<Peer>,
    fetcher: Fetcher,
    cache: OfflineCache,
    reply_timeout: Duration,
}

impl Interceptor {
    pub fn builder() -> InterceptorBuilder {
        InterceptorBuilder::default()
    }

    pub fn peer(&self) -> &Arc<Peer> {
        &self.peer
    }

    pub fn cache(&self) -> &OfflineCache {
        &self.cache
    }

    /// Runs the pipeline for one request.
    ///
    /// Blocks the calling thread for at most the reply timeout plus the fetch;
    /// must not be called from a runtime worker.
    pub fn intercept(&self, ids: CallerIds, request: &InterceptRequest) -> Intercept {
        let decision = self.ask_remote(ids, request);

        if let Some(response) = decision.as_ref().and_then(Self::serve_cached) {
            return Intercept::Served(response);
        }

        let url = match Self::eligible(request) {
            Ok(url) => url,
            Err(fallback) => return Intercept::NotIntercepted(fallback),
        };

        match self.fetch_and_respond(ids, request, &url, decision.as_ref()) {
            Ok(response) => Intercept::Served(response),
            Err(fallback) => {
                debug!(url = %request.url, %fallback, "not intercepted");
                Intercept::NotIntercepted(fallback)
            }
        }
    }

    fn ask_remote(&self, ids: CallerIds, request: &InterceptRequest) -> Option<InterceptDecision> {
        let args = ids.annotate(json!({ "url": request.url }));
        match self.peer.call_sync(SHOULD_INTERCEPT, args, self.reply_timeout) {
            Ok(reply) => InterceptDecision::from_reply(&reply),
            Err(e) => {
                debug!(url = %request.url, error = %e, "no decision");
                None
            }
        }
    }

    fn serve_cached(decision: &InterceptDecision) -> Option<WebResourceResponse> {
        let cached = decision.cached_file()?;
        match File::open(cached.path) {
            Ok(file) => Some(WebResourceResponse {
                mime_type: cached.mime_type.to_string(),
                encoding: cached.encoding.to_string(),
                status: 200,
                reason: "OK".to_string(),
                headers: Headers::new(),
                body: Box::new(file),
            }),
            Err(e) => {
                warn!(path = %cached.path.display(), error = %e, "cannot open cached file");
                None
            }
        }
    }

    fn eligible(request: &InterceptRequest) -> std::result::Result<Url, Fallback> {
        let ineligible = |scheme: &str| Fallback::Ineligible {
            method: request.method.clone(),
            scheme: scheme.to_string(),
        };

        let url = Url::parse(&request.url).map_err(|e| Fallback::Failed(Error::InvalidUrl(e)))?;
        let is_http = matches!(url.scheme(), "http" | "https");
        if !request.method.eq_ignore_ascii_case("GET") || !is_http {
            return Err(ineligible(url.scheme()));
        }
        Ok(url)
    }

    fn fetch_and_respond(
        &self,
        ids: CallerIds,
        request: &InterceptRequest,
        url: &Url,
        decision: Option<&InterceptDecision>,
    ) -> std::result::Result<WebResourceResponse, Fallback> {
        let FetchResult { status, reason, mut headers, mime_type, encoding, final_url, body } =
            self.fetcher.fetch(url, request)?;

        if status != 200 {
            return Err(Fallback::Status(status));
        }
        let mime_type = mime_type.ok_or(Fallback::UnresolvedMime)?;

        if request.is_cross_origin() {
            for (name, value) in CORS_HEADERS {
                headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
                headers.insert(name.to_string(), value.to_string());
            }
        }

        let persist = decision.is_none_or(InterceptDecision::wants_persist);
        let body: Box<dyn Read + Send> = if persist {
            let target = decision.and_then(|d| d.file_path.as_deref());
            let mut body = body;
            let path = self.cache.store(target, &mut body).map_err(Error::Io)?;
            let file = File::open(&path).map_err(Error::Io)?;

            self.peer.notify(
                INTERCEPT_COMPLETE,
                ids.annotate(json!({
                    "requestUrl": request.url,
                    "finalUrl": final_url.as_str(),
                    "mimeType": mime_type,
                    "webUrl": request.page_url,
                    "encoding": encoding,
                    "requestHeadersJson": request.headers_json().to_string(),
                    "filePath": path.to_string_lossy(),
                })),
            );
            Box::new(file)
        } else {
            Box::new(body)
        };

        Ok(WebResourceResponse {
            mime_type,
            encoding,
            status,
            reason,
            headers,
            body,
        })
    }
}

/// Assembles an `Interceptor`. A peer is required; everything else defaults.
pub struct InterceptorBuilder {
    config: InterceptConfig,
    peer: Option<Arc<Peer>>,
    cookies: Arc<dyn CookieStore>,
    client: Option<reqwest::Client>,
}

impl Default for InterceptorBuilder {
    fn default() -> Self {
        Self {
            config: InterceptConfig::default(),
            peer: None,
            cookies: Arc::new(NoCookies),
            client: None,
        }
    }
}

impl InterceptorBuilder {
    pub fn config(mut self, config: InterceptConfig) -> Self {
        self.config = config;
        self
    }

    pub fn peer(mut self, peer: Arc<Peer>) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn cookies(mut self, cookies: Arc<dyn CookieStore>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Uses a prepared HTTP client instead of one built from the config.
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> Result<Interceptor> {
        let peer = self
            .peer
            .ok_or_else(|| Error::Setup("interceptor needs a peer".into()))?;

        let client = match self.client {
            Some(client) => client,
            None => fetch::client(self.config.fetch_timeout(), self.config.user_agent.as_deref())?,
        };

        let fetcher = Fetcher::new(
            client,
            self.cookies,
            peer.runtime().clone(),
            self.config.default_encoding.clone(),
        );

        Ok(Interceptor {
            fetcher,
            cache: OfflineCache::new(self.config.offline_dir()),
            reply_timeout: self.config.reply_timeout(),
            peer,
        })
    }
}
