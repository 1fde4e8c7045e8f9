use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::causal::CausalMetadata;
use crate::entry::Entry;

/// The per-node keyspace: a map from key to [`Entry`], guarded by a
/// per-key exclusive lock (spec.md §4.2, §5).
///
/// The lock map grows monotonically and is never pruned — acceptable for
/// this design per spec.md §9, since the keyspace handled by one shard is
/// expected to stay small relative to node lifetime.
#[derive(Default)]
pub struct Store {
    data: RwLock<HashMap<String, Entry>>,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch (or create) the exclusive lock guarding `key`.
    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().unwrap().get(key) {
            return lock.clone();
        }
        let mut locks = self.locks.write().unwrap();
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `f` while holding `key`'s exclusive lock. `f` must not block on
    /// I/O or await — the lock is a plain [`std::sync::Mutex`] guarding a
    /// short, synchronous critical section (spec.md §5).
    pub fn with_key_lock<R>(&self, key: &str, f: impl FnOnce() -> R) -> R {
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap();
        f()
    }

    /// Lock-free snapshot read of one key's entry.
    pub fn get(&self, key: &str) -> Option<Entry> {
        self.data.read().unwrap().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().unwrap().contains_key(key)
    }

    /// Unconditional replace. Callers are expected to hold `key`'s lock
    /// (via [`Self::with_key_lock`]) for any check-then-act sequence.
    pub fn upsert(&self, key: &str, entry: Entry) {
        self.data.write().unwrap().insert(key.to_string(), entry);
    }

    pub fn remove(&self, key: &str) -> Option<Entry> {
        self.data.write().unwrap().remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.data.read().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A full copy of the local keyspace, as pushed to peers during gossip
    /// (spec.md §4.7) or transferred during a view change (spec.md §4.8).
    pub fn snapshot(&self) -> HashMap<String, Entry> {
        self.data.read().unwrap().clone()
    }

    /// Accept one foreign entry via the convergence arbitration rule
    /// (spec.md §4.6): insert if absent, replace if the foreign version
    /// arbitrates higher, otherwise drop it. Incoming `deps` are cleared —
    /// convergence treats an accepted entry as a settled fact, not a
    /// pending write (spec.md §4.6, §9 Open Question 3).
    pub fn converge_entry(&self, key: &str, mut foreign: Entry) {
        self.with_key_lock(key, || {
            foreign.deps = CausalMetadata::new();
            let mut data = self.data.write().unwrap();
            match data.get(key) {
                None => {
                    data.insert(key.to_string(), foreign);
                }
                Some(local) if local.version < foreign.version => {
                    data.insert(key.to_string(), foreign);
                }
                Some(_) => {
                    // local.version == foreign.version is a no-op; local.version >
                    // foreign.version drops the foreign entry. Either way, keep local.
                }
            }
        })
    }
}
