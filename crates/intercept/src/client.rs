//! # WebViewClient Bridge
//!
//! Relays WebViewClient callbacks to the remote side. Every message carries
//! the bridge ids of the client and the WebView it came from; callbacks for
//! objects the registry does not know are dropped without a message.

use std::sync::Arc;

use instances::BridgeId;
use instances::Registry;
use serde_json::Value;
use serde_json::json;
use syncrpc::Peer;
use tracing::trace;

use crate::pipeline::CallerIds;
use crate::pipeline::Interceptor;
use crate::request::InterceptRequest;
use crate::response::Fallback;
use crate::response::Intercept;

pub const ON_PAGE_STARTED: &str = "onPageStarted";
pub const ON_PAGE_FINISHED: &str = "onPageFinished";
pub const ON_RECEIVED_ERROR: &str = "onReceivedError";
pub const ON_RECEIVED_REQUEST_ERROR: &str = "onReceivedRequestError";
pub const REQUEST_LOADING: &str = "requestLoading";
pub const URL_LOADING: &str = "urlLoading";
pub const DISPOSE: &str = "dispose";

pub struct ClientBridge {
    registry: Arc<Registry>,
    interceptor: Interceptor,
}

impl ClientBridge {
    pub fn new(registry: Arc<Registry>, interceptor: Interceptor) -> Self {
        Self { registry, interceptor }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    fn peer(&self) -> &Peer {
        self.interceptor.peer()
    }

    fn ids<C: ?Sized, W: ?Sized>(&self, client: &Arc<C>, web_view: &Arc<W>) -> Option<CallerIds> {
        let client = self.registry.id_of(client)?;
        let web_view = self.registry.id_of(web_view)?;
        Some(CallerIds::new(client, web_view))
    }

    fn send<C: ?Sized, W: ?Sized>(&self, method: &str, client: &Arc<C>, web_view: &Arc<W>, args: Value) {
        match self.ids(client, web_view) {
            Some(ids) => self.peer().notify(method, ids.annotate(args)),
            None => trace!(method, "callback from unregistered instance"),
        }
    }

    /// `shouldInterceptRequest`: substitute a response or leave the request alone.
    pub fn should_intercept_request<C: ?Sized, W: ?Sized>(
        &self,
        client: &Arc<C>,
        web_view: &Arc<W>,
        request: &InterceptRequest,
    ) -> Intercept {
        match self.ids(client, web_view) {
            Some(ids) => self.interceptor.intercept(ids, request),
            None => Intercept::NotIntercepted(Fallback::Unregistered),
        }
    }

    pub fn on_page_started<C: ?Sized, W: ?Sized>(&self, client: &Arc<C>, web_view: &Arc<W>, url: &str) {
        self.send(ON_PAGE_STARTED, client, web_view, json!({ "url": url }));
    }

    pub fn on_page_finished<C: ?Sized, W: ?Sized>(&self, client: &Arc<C>, web_view: &Arc<W>, url: &str) {
        self.send(ON_PAGE_FINISHED, client, web_view, json!({ "url": url }));
    }

    /// The legacy error callback, without a request.
    pub fn on_received_error<C: ?Sized, W: ?Sized>(
        &self,
        client: &Arc<C>,
        web_view: &Arc<W>,
        error_code: i64,
        description: &str,
        failing_url: &str,
    ) {
        let args = json!({
            "errorCode": error_code,
            "description": description,
            "failingUrl": failing_url,
        });
        self.send(ON_RECEIVED_ERROR, client, web_view, args);
    }

    pub fn on_received_request_error<C: ?Sized, W: ?Sized>(
        &self,
        client: &Arc<C>,
        web_view: &Arc<W>,
        request: &InterceptRequest,
        error_code: i64,
        description: &str,
    ) {
        let args = json!({
            "request": request.to_json(),
            "error": { "errorCode": error_code, "description": description },
        });
        self.send(ON_RECEIVED_REQUEST_ERROR, client, web_view, args);
    }

    /// `shouldOverrideUrlLoading` with a full request.
    pub fn request_loading<C: ?Sized, W: ?Sized>(
        &self,
        client: &Arc<C>,
        web_view: &Arc<W>,
        request: &InterceptRequest,
    ) {
        self.send(REQUEST_LOADING, client, web_view, json!({ "request": request.to_json() }));
    }

    /// `shouldOverrideUrlLoading` with only a URL.
    pub fn url_loading<C: ?Sized, W: ?Sized>(&self, client: &Arc<C>, web_view: &Arc<W>, url: &str) {
        self.send(URL_LOADING, client, web_view, json!({ "url": url }));
    }

    /// Forgets `client` and tells the remote side, if it was registered.
    ///
    /// Returns the freed id. A second dispose of the same client sends nothing.
    pub fn dispose<C: ?Sized>(&self, client: &Arc<C>) -> Option<BridgeId> {
        let id = self.registry.remove(client)?;
        self.peer().notify(DISPOSE, json!({ "instanceId": id.0 }));
        Some(id)
    }
}
