use serde::{Deserialize, Serialize};

use crate::causal::CausalMetadata;
use crate::version::Version;

/// One live key's value plus the causal bookkeeping needed to arbitrate
/// and gossip it (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub value: String,
    pub version: Version,
    pub deps: CausalMetadata,
}

impl Entry {
    pub fn new(value: String, version: Version, deps: CausalMetadata) -> Self {
        Self {
            value,
            version,
            deps,
        }
    }
}
