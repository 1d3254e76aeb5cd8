//! # Wire Frames
//!
//! Every message on the bridge is one JSON object tagged by `kind`:
//!
//! - `call`:  `{"kind":"call","seq":1,"method":"shouldIntercept","args":{..}}`
//! - `reply`: `{"kind":"reply","seq":1,"result":{..}}`
//! - `event`: `{"kind":"event","method":"onInterceptComplete","args":{..}}`
//!
//! A `reply` echoes the `seq` of the `call` it answers. Events never get one.
//! A `null` result is a valid reply meaning "nothing to say".

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Frame {
    Call {
        seq: u64,
        method: String,
        #[serde(default)]
        args: Value,
    },
    Reply {
        seq: u64,
        #[serde(default)]
        result: Value,
    },
    Event {
        method: String,
        #[serde(default)]
        args: Value,
    },
}

impl Frame {
    pub fn call(seq: u64, method: impl Into<String>, args: Value) -> Self {
        Self::Call { seq, method: method.into(), args }
    }

    pub fn reply(seq: u64, result: Value) -> Self {
        Self::Reply { seq, result }
    }

    pub fn event(method: impl Into<String>, args: Value) -> Self {
        Self::Event { method: method.into(), args }
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
