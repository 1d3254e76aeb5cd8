//! Shared fixture: a local HTTP origin, a scripted remote side, and an
//! interceptor wired to both.
//!
//! Tests call the interceptor from the test thread, which stands in for a
//! WebView render thread.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::AppendHeaders;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use serde_json::Value;
use tempfile::TempDir;
use tokio::runtime::Runtime;

use instances::BridgeId;
use intercept::CallerIds;
use intercept::InterceptConfig;
use intercept::Interceptor;
use intercept::cookies::CookieStore;
use intercept::cookies::NoCookies;
use intercept::pipeline::INTERCEPT_COMPLETE;
use syncrpc::Peer;
use syncrpc::channel::ChannelTransport;
use syncrpc::responder::Inbound;
use syncrpc::responder::Responder;

pub const PAGE_BODY: &str = "<h1>net</h1>";

pub fn ids() -> CallerIds {
    CallerIds::new(BridgeId(1), BridgeId(2))
}

/// What the origin server saw.
#[derive(Default)]
pub struct ServerLog {
    hits: AtomicUsize,
    headers: Mutex<Vec<HeaderMap>>,
}

impl ServerLog {
    fn record(&self, headers: HeaderMap) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.headers.lock().unwrap().push(headers);
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_headers(&self) -> HeaderMap {
        self.headers.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

/// A message the remote side received.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub args: Value,
    /// For `onInterceptComplete`: the named file's contents when the event arrived.
    pub file_content: Option<String>,
}

/// What the remote side answers and what it has seen.
#[derive(Default)]
pub struct Remote {
    /// `None` never answers.
    decision: Mutex<Option<Value>>,
    calls: Mutex<Vec<Seen>>,
    events: Mutex<Vec<Seen>>,
}

impl Remote {
    pub fn calls(&self) -> Vec<Seen> {
        self.calls.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<Seen> {
        self.events.lock().unwrap().clone()
    }

    /// Polls until `n` events have arrived or a second has passed.
    pub fn wait_events(&self, n: usize) -> Vec<Seen> {
        let deadline = Instant::now() + Duration::from_secs(1);
        loop {
            let events = self.events();
            if events.len() >= n || Instant::now() >= deadline {
                return events;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    async fn handle(&self, msg: Inbound) -> Option<Value> {
        match msg {
            Inbound::Call { method, args } => {
                self.calls.lock().unwrap().push(Seen { method, args, file_content: None });
                self.decision.lock().unwrap().clone()
            }
            Inbound::Event { method, args } => {
                let file_content = (method == INTERCEPT_COMPLETE)
                    .then(|| args["filePath"].as_str().map(str::to_string))
                    .flatten()
                    .and_then(|path| std::fs::read_to_string(path).ok());
                self.events.lock().unwrap().push(Seen { method, args, file_content });
                None
            }
        }
    }
}

pub struct Harness {
    pub base: String,
    pub server: Arc<ServerLog>,
    pub remote: Arc<Remote>,
    pub files: TempDir,
    pub interceptor: Interceptor,
    _responder: Responder,
    // Last, so the tasks above are gone before the runtime shuts down.
    pub rt: Runtime,
}

impl Harness {
    pub fn new(decision: Option<Value>) -> Self {
        Self::with_cookies(decision, Arc::new(NoCookies))
    }

    pub fn with_cookies(decision: Option<Value>, cookies: Arc<dyn CookieStore>) -> Self {
        intercept::logging::init("intercept=debug,syncrpc=debug");

        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("runtime");

        let server = Arc::new(ServerLog::default());
        let base = rt.block_on(serve(server.clone()));

        let remote = Arc::new(Remote { decision: Mutex::new(decision), ..Remote::default() });
        let (near, far) = ChannelTransport::pair();
        let handler_remote = remote.clone();
        let responder = Responder::spawn(rt.handle(), Box::new(far), move |msg| {
            let remote = handler_remote.clone();
            async move { remote.handle(msg).await }
        });
        let peer = Arc::new(Peer::new("remote", Box::new(near), rt.handle().clone()));

        let files = tempfile::tempdir().expect("tempdir");
        let config = InterceptConfig {
            files_dir: files.path().to_path_buf(),
            ..InterceptConfig::default()
        };
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("client");

        let interceptor = Interceptor::builder()
            .config(config)
            .peer(peer)
            .cookies(cookies)
            .client(client)
            .build()
            .expect("interceptor");

        Self { base, server, remote, files, interceptor, _responder: responder, rt }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn offline_dir(&self) -> std::path::PathBuf {
        self.files.path().join("offline")
    }

    /// Regular files under the offline directory, `.part` leftovers included.
    pub fn offline_files(&self) -> Vec<std::path::PathBuf> {
        list(&self.offline_dir())
    }
}

fn list(dir: &Path) -> Vec<std::path::PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Starts the origin and returns its base URL.
async fn serve(log: Arc<ServerLog>) -> String {
    let app = Router::new()
        .route("/page.html", get(page))
        .route("/plain", get(plain))
        .route("/missing", get(missing))
        .route("/data.json", get(untyped_json))
        .route("/blob", get(blob))
        .route("/multi", get(multi))
        .route("/negotiated", get(negotiated))
        .route("/upstream-cors", get(upstream_cors))
        .with_state(log);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

async fn page(State(log): State<Arc<ServerLog>>, headers: HeaderMap) -> impl IntoResponse {
    log.record(headers);
    ([(header::CONTENT_TYPE, "text/html; charset=UTF-8")], PAGE_BODY)
}

async fn plain(State(log): State<Arc<ServerLog>>, headers: HeaderMap) -> impl IntoResponse {
    log.record(headers);
    ([(header::CONTENT_TYPE, "text/plain")], "plain")
}

async fn missing(State(log): State<Arc<ServerLog>>, headers: HeaderMap) -> impl IntoResponse {
    log.record(headers);
    (StatusCode::NOT_FOUND, ([(header::CONTENT_TYPE, "text/html")], "gone"))
}

async fn untyped_json(State(log): State<Arc<ServerLog>>, headers: HeaderMap) -> Response {
    log.record(headers);
    Response::new(Body::from(r#"{"ok":true}"#))
}

async fn blob(State(log): State<Arc<ServerLog>>, headers: HeaderMap) -> Response {
    log.record(headers);
    Response::new(Body::from(vec![0u8, 1, 2, 3]))
}

async fn multi(State(log): State<Arc<ServerLog>>, headers: HeaderMap) -> impl IntoResponse {
    log.record(headers);
    (
        AppendHeaders([("x-multi", "a"), ("x-multi", "b")]),
        ([(header::CONTENT_TYPE, "text/plain")], "multi"),
    )
}

/// Answers gzip-labelled bytes to anyone who says they accept gzip.
async fn negotiated(State(log): State<Arc<ServerLog>>, headers: HeaderMap) -> Response {
    let wants_gzip = headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"));
    log.record(headers);
    if wants_gzip {
        (
            [(header::CONTENT_TYPE, "text/plain"), (header::CONTENT_ENCODING, "gzip")],
            vec![0x1f_u8, 0x8b, 0x08, 0x00],
        )
            .into_response()
    } else {
        ([(header::CONTENT_TYPE, "text/plain")], "identity").into_response()
    }
}

async fn upstream_cors(State(log): State<Arc<ServerLog>>, headers: HeaderMap) -> impl IntoResponse {
    log.record(headers);
    (
        [
            (header::CONTENT_TYPE, "text/plain"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "X-Upstream"),
        ],
        "cors",
    )
}
