//! # Intercept
//!
//! The native half of a WebView bridge. WebView callbacks arrive on render
//! threads; this crate turns them into messages for the remote (UI) side and,
//! for resource requests, decides what the WebView should load.
//!
//! ## Philosophy
//!
//! The remote side owns the cache index and the policy. The native side only
//! asks, and never waits long: a silent or slow remote means "carry on as if
//! nobody asked". Anything that fails on the way to a substitute response
//! leaves the request to the WebView's own loader.

pub mod cache;
pub mod client;
pub mod config;
pub mod content_type;
pub mod cookies;
pub mod decision;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod pipeline;
pub mod request;
pub mod response;

pub use client::ClientBridge;
pub use config::InterceptConfig;
pub use decision::InterceptDecision;
pub use error::Error;
pub use error::Result;
pub use pipeline::CallerIds;
pub use pipeline::Interceptor;
pub use request::InterceptRequest;
pub use response::Fallback;
pub use response::Intercept;
pub use response::WebResourceResponse;
