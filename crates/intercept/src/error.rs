//! # Error Definitions
//!
//! Failures inside the interception path. None of these reach the native
//! callback: the pipeline folds them into a `Fallback`.

#[derive(Debug)]
pub enum Error {
    /// The request could not be sent or the response could not be read.
    Http(reqwest::Error),
    /// Reading or writing the offline cache failed.
    Io(std::io::Error),
    /// The request URL did not parse.
    InvalidUrl(url::ParseError),
    /// The interceptor was assembled without something it needs.
    Setup(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "HTTP error: {}", e),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::InvalidUrl(e) => write!(f, "Invalid URL: {}", e),
            Self::Setup(msg) => write!(f, "Setup error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::InvalidUrl(e) => Some(e),
            Self::Setup(_) => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::InvalidUrl(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
