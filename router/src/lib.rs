//! Deterministic key-to-shard routing (spec.md §4.1) and the [`View`] type
//! it routes against.

pub mod endpoint;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use snafu::Snafu;

pub use endpoint::Endpoint;

/// One member of a shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: i64,
    pub address: String,
}

impl NodeDescriptor {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.address.clone())
    }
}

/// The current mapping of shard name to its member nodes (spec.md §3).
pub type View = HashMap<String, Vec<NodeDescriptor>>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("view is empty, node not online"))]
    EmptyView,
}

pub type Result<T> = std::result::Result<T, Error>;

/// `router(key)` from spec.md §4.1: SHA-1 the UTF-8 key, interpret the
/// digest as a big-endian unsigned integer, and index `n mod
/// len(sorted(shard_names))`. Deterministic for any two nodes holding the
/// same view (testable property 5 / 6 in spec.md §8).
pub fn route(key: &str, view: &View) -> Result<String> {
    let mut shard_names: Vec<&String> = view.keys().collect();
    shard_names.sort();
    if shard_names.is_empty() {
        return EmptyViewSnafu.fail();
    }

    let digest = Sha1::digest(key.as_bytes());
    let n_shards = shard_names.len() as u64;
    // Horner's method: reduce the big-endian digest mod n_shards one byte
    // at a time, equivalent to `int(digest, 16) % n_shards` without
    // needing a bignum type.
    let idx = digest
        .iter()
        .fold(0u64, |acc, byte| (acc * 256 + *byte as u64) % n_shards);

    Ok(shard_names[idx as usize].clone())
}
