use std::collections::HashMap;

use crate::version::Version;

/// Causal metadata: a mapping from key to the version a client (or an
/// entry's `deps`) has observed. The wire-format is a plain JSON object
/// (spec.md §6); an empty object means "no prior observations".
pub type CausalMetadata = HashMap<String, Version>;

/// `dep_check` from spec.md §4.4: every key in `deps` must be present in
/// `client_md`. Deliberately checks presence only, not version dominance —
/// this is the final revision's behavior, preserved as-is (see Open
/// Question 1 in spec.md §9 / DESIGN.md).
pub fn dep_check(deps: &CausalMetadata, client_md: &CausalMetadata) -> bool {
    deps.keys().all(|k| client_md.contains_key(k))
}

/// Arbitration merge of a single dependency into `client_md` (spec.md
/// §4.4): tighten an existing entry to the newer version, never add a key
/// that wasn't already present.
pub fn merge_dep(client_md: &mut CausalMetadata, dep_key: &str, dep_version: &Version) {
    if let Some(existing) = client_md.get(dep_key) {
        if existing < dep_version {
            client_md.insert(dep_key.to_string(), *dep_version);
        }
    }
}

/// Merge every dependency of `deps` into `client_md` via [`merge_dep`].
pub fn merge_deps(client_md: &mut CausalMetadata, deps: &CausalMetadata) {
    for (k, v) in deps {
        merge_dep(client_md, k, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(pairs: &[(&str, f64, i64)]) -> CausalMetadata {
        pairs
            .iter()
            .map(|(k, t, n)| (k.to_string(), Version::new(*t, *n)))
            .collect()
    }

    #[test]
    fn dep_check_requires_presence_only() {
        let deps = md(&[("x", 5.0, 0)]);
        let client_md = md(&[("x", 1.0, 9)]); // older version, but present
        assert!(dep_check(&deps, &client_md));
    }

    #[test]
    fn dep_check_fails_on_missing_key() {
        let deps = md(&[("x", 5.0, 0)]);
        let client_md = CausalMetadata::new();
        assert!(!dep_check(&deps, &client_md));
    }

    #[test]
    fn merge_dep_only_tightens_existing_entries() {
        let mut client_md = md(&[("x", 1.0, 0)]);
        merge_dep(&mut client_md, "x", &Version::new(2.0, 0));
        assert_eq!(client_md["x"], Version::new(2.0, 0));

        // "y" was never seen by the client; merge must not introduce it.
        merge_dep(&mut client_md, "y", &Version::new(1.0, 0));
        assert!(!client_md.contains_key("y"));
    }
}
