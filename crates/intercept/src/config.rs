//! Interceptor settings.
//!
//! Values come from an optional TOML file, overridden by `INTERCEPT_*`
//! environment variables (`INTERCEPT_FILES_DIR`, `INTERCEPT_REPLY_TIMEOUT_MS`, ...).
//! Every field has a default, so an empty source is a valid configuration.

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub const ENV_PREFIX: &str = "INTERCEPT";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InterceptConfig {
    /// App-private storage root; cached bodies go under `<files_dir>/offline`.
    pub files_dir: PathBuf,
    /// How long a render thread may wait for the remote decision.
    pub reply_timeout_ms: u64,
    /// Upper bound on a whole network fetch, body included.
    pub fetch_timeout_ms: u64,
    /// Encoding reported when a response names no charset.
    pub default_encoding: String,
    pub user_agent: Option<String>,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            files_dir: PathBuf::from("files"),
            reply_timeout_ms: syncrpc::DEFAULT_REPLY_TIMEOUT.as_millis() as u64,
            fetch_timeout_ms: 30_000,
            default_encoding: "UTF-8".to_string(),
            user_agent: None,
        }
    }
}

impl InterceptConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn offline_dir(&self) -> PathBuf {
        self.files_dir.join("offline")
    }
}

/// Loads the configuration from `path` (if given and present) and the environment.
pub fn load(path: Option<&Path>) -> anyhow::Result<InterceptConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(false));
    }
    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

    let config = builder.build()?.try_deserialize()?;
    Ok(config)
}
