//! # Intercept Decision
//!
//! The remote side's answer to "do you have this URL?". It either names a
//! local file to serve (with its MIME type and encoding), asks for the body to
//! be stored at a given path, or says nothing at all.

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptDecision {
    pub file_path: Option<PathBuf>,
    pub mime_type: Option<String>,
    pub encoding: Option<String>,
}

impl InterceptDecision {
    /// Reads a decision out of a reply.
    ///
    /// Accepts an object, or a string holding a JSON object. `null`, an empty
    /// string, and anything unparsable mean "no decision".
    pub fn from_reply(reply: &Value) -> Option<Self> {
        let parsed = match reply {
            Value::Null => return None,
            Value::String(s) if s.trim().is_empty() => return None,
            Value::String(s) => serde_json::from_str::<Self>(s),
            Value::Object(_) => Self::deserialize(reply),
            _ => {
                debug!(%reply, "ignoring non-object decision");
                return None;
            }
        };

        match parsed {
            Ok(decision) => Some(decision.normalized()),
            Err(e) => {
                debug!(error = %e, "unparsable decision");
                None
            }
        }
    }

    /// Empty strings count as absent.
    fn normalized(self) -> Self {
        Self {
            file_path: self.file_path.filter(|p| !p.as_os_str().is_empty()),
            mime_type: self.mime_type.filter(|s| !s.trim().is_empty()),
            encoding: self.encoding.filter(|s| !s.trim().is_empty()),
        }
    }

    /// All three fields are present.
    pub fn is_complete(&self) -> bool {
        self.file_path.is_some() && self.mime_type.is_some() && self.encoding.is_some()
    }

    /// A fetched body should be stored and reported back, because the remote
    /// side could not describe a ready file. A named file that is gone counts
    /// as not described.
    pub fn wants_persist(&self) -> bool {
        self.cached_file().is_none()
    }

    /// The file to serve, if the decision is complete and the file exists now.
    pub fn cached_file(&self) -> Option<CachedFile<'_>> {
        let (Some(path), Some(mime_type), Some(encoding)) =
            (self.file_path.as_deref(), self.mime_type.as_deref(), self.encoding.as_deref())
        else {
            return None;
        };
        path.is_file().then_some(CachedFile { path, mime_type, encoding })
    }
}

/// A decision that points at a servable file.
#[derive(Debug, Clone, Copy)]
pub struct CachedFile<'a> {
    pub path: &'a Path,
    pub mime_type: &'a str,
    pub encoding: &'a str,
}
