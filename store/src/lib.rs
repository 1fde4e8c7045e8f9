//! In-memory, per-key-locked keyspace and the causal-metadata primitives
//! that sit on top of it (spec.md §3, §4.2, §4.4, §4.6).

mod causal;
mod entry;
mod kvstore;
mod version;

pub use causal::{dep_check, merge_dep, merge_deps, CausalMetadata};
pub use entry::Entry;
pub use kvstore::Store;
pub use version::Version;
