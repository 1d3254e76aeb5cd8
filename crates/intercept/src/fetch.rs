//! # Network Fetch
//!
//! Performs the request a WebView would have made, from a thread that is not
//! part of the runtime. The request is driven on the runtime with
//! `Handle::block_on`; the body is pulled the same way, one chunk per read,
//! so it can be handed to a synchronous consumer as a plain `Read`.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::ACCEPT_ENCODING;
use reqwest::header::CACHE_CONTROL;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::COOKIE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use tokio::runtime::Handle;
use tracing::debug;
use url::Url;

use crate::content_type;
use crate::cookies::CookieStore;
use crate::error::Result;
use crate::request::InterceptRequest;
use crate::response::Headers;

/// A response whose head has arrived and whose body has not been read yet.
#[derive(Debug)]
pub struct FetchResult {
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
    /// From `Content-Type`, or guessed from the URL when that is missing.
    pub mime_type: Option<String>,
    /// From the `Content-Type` charset, or the configured default.
    pub encoding: String,
    pub final_url: Url,
    pub body: NetworkBody,
}

/// The body of a fetched response as a blocking reader.
pub struct NetworkBody {
    runtime: Handle,
    response: reqwest::Response,
    chunk: Bytes,
    pos: usize,
    done: bool,
}

impl NetworkBody {
    fn new(runtime: Handle, response: reqwest::Response) -> Self {
        Self { runtime, response, chunk: Bytes::new(), pos: 0, done: false }
    }
}

impl Read for NetworkBody {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.pos >= self.chunk.len() {
            if self.done {
                return Ok(0);
            }
            match self.runtime.block_on(self.response.chunk()) {
                Ok(Some(chunk)) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Ok(None) => self.done = true,
                Err(e) => return Err(std::io::Error::other(e)),
            }
        }

        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl std::fmt::Debug for NetworkBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkBody")
            .field("url", &self.response.url().as_str())
            .field("done", &self.done)
            .finish()
    }
}

/// Builds the HTTP client used for fetches.
pub fn client(timeout: Duration, user_agent: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }
    Ok(builder.build()?)
}

/// Joins repeated header values with `,`, one entry per name.
pub fn flatten_headers(headers: &HeaderMap) -> Headers {
    let mut flat = Headers::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        flat.insert(name.as_str().to_string(), joined);
    }
    flat
}

pub struct Fetcher {
    client: reqwest::Client,
    cookies: Arc<dyn CookieStore>,
    runtime: Handle,
    default_encoding: String,
}

impl Fetcher {
    pub fn new(
        client: reqwest::Client,
        cookies: Arc<dyn CookieStore>,
        runtime: Handle,
        default_encoding: impl Into<String>,
    ) -> Self {
        Self {
            client,
            cookies,
            runtime,
            default_encoding: default_encoding.into(),
        }
    }

    /// The page's headers, the jar's cookie for `url`, and no caching.
    ///
    /// `Accept-Encoding` is not forwarded: the body is stored and served
    /// without its response headers, so it has to arrive unencoded.
    fn outgoing_headers(&self, url: &Url, request: &InterceptRequest) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), _) if name == ACCEPT_ENCODING => {}
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => debug!(header = %name, "skipping invalid request header"),
            }
        }

        if let Some(cookie) = self.cookies.cookie(url) {
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    headers.insert(COOKIE, value);
                }
                Err(_) => debug!(%url, "skipping invalid cookie"),
            }
        }

        if !headers.contains_key(CACHE_CONTROL) {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        }
        headers
    }

    /// Sends a GET for `url` and waits for the response head.
    ///
    /// Blocks the calling thread, which must not be a runtime worker.
    pub fn fetch(&self, url: &Url, request: &InterceptRequest) -> Result<FetchResult> {
        let headers = self.outgoing_headers(url, request);
        // reqwest arms its timeout when the request is sent, which needs the reactor.
        let response = self
            .runtime
            .block_on(async { self.client.get(url.clone()).headers(headers).send().await })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mime_type = content_type
            .as_deref()
            .and_then(content_type::mime_of)
            .or_else(|| content_type::guess_from_url(url));
        let encoding = content_type
            .as_deref()
            .and_then(content_type::charset_of)
            .unwrap_or_else(|| self.default_encoding.clone());

        debug!(%url, status = status.as_u16(), ?mime_type, "fetched");

        Ok(FetchResult {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers: flatten_headers(response.headers()),
            mime_type,
            encoding,
            final_url: response.url().clone(),
            body: NetworkBody::new(self.runtime.clone(), response),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_headers_joins_repeats() {
        let mut headers = HeaderMap::new();
        headers.append("x-multi", HeaderValue::from_static("a"));
        headers.append("x-multi", HeaderValue::from_static("b"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        let flat = flatten_headers(&headers);
        assert_eq!(flat.get("x-multi").map(String::as_str), Some("a,b"));
        assert_eq!(flat.get("content-type").map(String::as_str), Some("text/plain"));
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn test_outgoing_headers() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let cookies = Arc::new(crate::cookies::MemoryCookies::new());
        cookies.set("a.example", "sid=1");
        let fetcher = Fetcher::new(reqwest::Client::new(), cookies, rt.handle().clone(), "UTF-8");

        let url = Url::parse("https://a.example/x").unwrap();
        let req = InterceptRequest::get(url.as_str())
            .with_header("X-Requested-With", "app")
            .with_header("Accept-Encoding", "gzip, br")
            .with_header("bad header", "v");
        let headers = fetcher.outgoing_headers(&url, &req);
        assert!(!headers.contains_key(ACCEPT_ENCODING));

        assert_eq!(headers.get("x-requested-with").unwrap(), "app");
        assert_eq!(headers.get(COOKIE).unwrap(), "sid=1");
        assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "no-cache");
        assert_eq!(headers.len(), 3);

        // A page-supplied Cache-Control is kept.
        let req = InterceptRequest::get(url.as_str()).with_header("Cache-Control", "max-age=0");
        assert_eq!(fetcher.outgoing_headers(&url, &req).get(CACHE_CONTROL).unwrap(), "max-age=0");
    }
}
