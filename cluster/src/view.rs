use log::info;
use router::View;

use crate::peer_client::PeerClient;
use crate::state::NodeState;

/// Install a new view (spec.md §4.8): determine this node's membership,
/// drain keys that no longer belong here to their new owning shard, and
/// commit the new (or, if evicted, empty) view.
///
/// Redistribution routes against the *incoming* view, not the node's own
/// post-install membership — a node that is being evicted still owns its
/// keys until they've been handed off, so it must still be able to resolve
/// where they belong. A totally empty incoming view (no shards at all,
/// e.g. a cluster-wide teardown) has no routing table to redistribute
/// against, so redistribution is skipped and the local store is left in
/// place (spec.md §9 Open Question 4) rather than erased.
pub async fn install_view(state: &NodeState, peer: &PeerClient, new_view: View) {
    let membership = NodeState::find_membership(state.node_id(), &new_view);
    let new_shard_name = membership.as_ref().map(|(name, _)| name.clone());

    if !new_view.is_empty() {
        for key in state.store.keys() {
            // infallible: new_view is non-empty in this branch.
            let correct = router::route(&key, &new_view).expect("non-empty view");
            if Some(&correct) == new_shard_name.as_ref() {
                continue;
            }
            let Some(entry) = state.store.get(&key) else {
                continue;
            };
            let Some(target_nodes) = new_view.get(&correct) else {
                continue;
            };
            info!("transferring key {key} to shard {correct}");
            peer.send_key(target_nodes, &key, &entry).await;
            state.store.remove(&key);
        }
    }

    let (committed_view, shard_name, shard_nodes) = match membership {
        Some((name, nodes)) => (new_view, Some(name), nodes),
        None => (View::new(), None, Vec::new()),
    };
    state.commit_view(committed_view, shard_name, shard_nodes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterConfig;
    use router::NodeDescriptor;
    use std::time::Duration;
    use store::{CausalMetadata, Entry, Version};

    fn config(node_id: i64) -> ClusterConfig {
        ClusterConfig {
            node_id,
            bind_addr: "0.0.0.0:0".into(),
            gossip_interval: Duration::from_secs(2),
            gossip_fanout: 2,
            causal_wait_interval: Duration::from_millis(200),
            forward_timeout: Duration::from_secs(2),
        }
    }

    fn descriptor(id: i64, addr: &str) -> NodeDescriptor {
        NodeDescriptor {
            id,
            address: addr.to_string(),
        }
    }

    #[tokio::test]
    async fn keys_that_still_belong_here_are_kept() {
        let state = NodeState::new(config(1));
        let mut view = View::new();
        view.insert("only".into(), vec![descriptor(1, "a:8081")]);
        let peer = PeerClient::new(Duration::from_secs(1));

        install_view(&state, &peer, view.clone()).await;
        assert_eq!(state.shard_name(), Some("only".into()));

        state.store.upsert(
            "x",
            Entry::new("v".into(), Version::new(1.0, 1), CausalMetadata::new()),
        );

        // Re-installing the same single-shard view should keep the key local.
        install_view(&state, &peer, view).await;
        assert!(state.store.contains_key("x"));
    }

    #[tokio::test]
    async fn eviction_into_another_shard_drains_keys_away() {
        let state = NodeState::new(config(1));
        let mut view = View::new();
        view.insert("s1".into(), vec![descriptor(1, "a:8081")]);
        let peer = PeerClient::new(Duration::from_secs(1));
        install_view(&state, &peer, view).await;

        state.store.upsert(
            "x",
            Entry::new("v".into(), Version::new(1.0, 1), CausalMetadata::new()),
        );

        let mut next_view = View::new();
        next_view.insert("s1".into(), vec![descriptor(2, "b:8081")]);
        install_view(&state, &peer, next_view).await;

        assert!(!state.is_online());
        assert_eq!(state.shard_name(), None);
        // The key was redistributed to s1's new owner and removed locally
        // (spec.md §4.8 step 3 treats "no shard for this node" the same as
        // any other shard mismatch).
        assert!(!state.store.contains_key("x"));
    }

    #[tokio::test]
    async fn eviction_into_a_fully_empty_view_leaves_the_store_untouched() {
        let state = NodeState::new(config(1));
        let mut view = View::new();
        view.insert("s1".into(), vec![descriptor(1, "a:8081")]);
        let peer = PeerClient::new(Duration::from_secs(1));
        install_view(&state, &peer, view).await;

        state.store.upsert(
            "x",
            Entry::new("v".into(), Version::new(1.0, 1), CausalMetadata::new()),
        );

        install_view(&state, &peer, View::new()).await;

        assert!(!state.is_online());
        assert_eq!(state.shard_name(), None);
        // Per spec.md §9 Open Question 4: a teardown to an empty view (no
        // routing table to redistribute against) leaves local data in place.
        assert!(state.store.contains_key("x"));
    }
}
