use std::collections::HashMap;

use store::{Entry, Store};

/// Accept a peer's snapshot via per-key arbitration (spec.md §4.6). Safe
/// to call repeatedly and in any order — convergence is idempotent and
/// commutative by construction of [`Store::converge_entry`].
pub fn apply_snapshot(store: &Store, foreign_kvs: HashMap<String, Entry>) {
    for (key, entry) in foreign_kvs {
        store.converge_entry(&key, entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{CausalMetadata, Version};

    #[test]
    fn converges_to_the_higher_arbitration_version() {
        let store = Store::new();
        store.upsert(
            "x",
            Entry::new("old".into(), Version::new(1.0, 0), CausalMetadata::new()),
        );

        let mut foreign = HashMap::new();
        foreign.insert(
            "x".to_string(),
            Entry::new("new".into(), Version::new(2.0, 0), CausalMetadata::new()),
        );
        apply_snapshot(&store, foreign);

        assert_eq!(store.get("x").unwrap().value, "new");
    }

    #[test]
    fn running_twice_is_idempotent() {
        let store = Store::new();
        let mut foreign = HashMap::new();
        foreign.insert(
            "x".to_string(),
            Entry::new("v".into(), Version::new(1.0, 0), CausalMetadata::new()),
        );
        apply_snapshot(&store, foreign.clone());
        apply_snapshot(&store, foreign);
        assert_eq!(store.get("x").unwrap().value, "v");
    }
}
