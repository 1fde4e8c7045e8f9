//! JSON wire bodies for the external and internal HTTP endpoints (spec.md
//! §6). Shared between the server's inbound handlers and the peer client's
//! outbound calls so both sides agree on field names (notably the
//! hyphenated `causal-metadata`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use store::{CausalMetadata, Entry, Version};

use router::View;

#[derive(Debug, Clone, Deserialize)]
pub struct ViewRequestBody {
    pub view: View,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergeRequestBody {
    pub kvs: HashMap<String, Entry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptKeyRequestBody {
    pub key: String,
    pub value: String,
    pub version: Version,
    pub deps: CausalMetadata,
}

impl AcceptKeyRequestBody {
    pub fn from_entry(key: String, entry: Entry) -> Self {
        Self {
            key,
            value: entry.value,
            version: entry.version,
            deps: entry.deps,
        }
    }
}
