//! Access to the browser's cookie jar.

use dashmap::DashMap;
use url::Url;

/// Source of the `Cookie` header the WebView would send to a URL.
pub trait CookieStore: Send + Sync + 'static {
    fn cookie(&self, url: &Url) -> Option<String>;
}

/// A jar that is always empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCookies;

impl CookieStore for NoCookies {
    fn cookie(&self, _url: &Url) -> Option<String> {
        None
    }
}

/// Cookie strings keyed by host.
#[derive(Debug, Default)]
pub struct MemoryCookies {
    by_host: DashMap<String, String>,
}

impl MemoryCookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, host: impl Into<String>, cookie: impl Into<String>) {
        self.by_host.insert(host.into(), cookie.into());
    }

    pub fn remove(&self, host: &str) {
        self.by_host.remove(host);
    }
}

impl CookieStore for MemoryCookies {
    fn cookie(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?;
        self.by_host.get(host).map(|entry| entry.value().clone())
    }
}
