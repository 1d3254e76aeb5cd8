//! The resource request a WebView asks about.

use serde_json::Map;
use serde_json::Value;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptRequest {
    pub url: String,
    pub method: String,
    /// In the order the WebView supplied them.
    pub headers: Vec<(String, String)>,
    pub is_for_main_frame: bool,
    pub has_gesture: bool,
    pub is_redirect: bool,
    /// The document currently shown by the WebView.
    pub page_url: Option<String>,
}

impl InterceptRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            headers: Vec::new(),
            is_for_main_frame: false,
            has_gesture: false,
            is_redirect: false,
            page_url: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = Some(page_url.into());
        self
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The page is fetching this resource from another origin.
    pub fn is_cross_origin(&self) -> bool {
        self.header("Origin").is_some()
    }

    pub fn headers_json(&self) -> Value {
        let map: Map<String, Value> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }

    /// The request as the remote side's WebResourceRequest record.
    pub fn to_json(&self) -> Value {
        json!({
            "url": self.url,
            "isForMainFrame": self.is_for_main_frame,
            "isRedirect": self.is_redirect,
            "hasGesture": self.has_gesture,
            "method": self.method,
            "requestHeaders": self.headers_json(),
        })
    }
}
