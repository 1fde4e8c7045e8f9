use std::sync::{Arc, RwLock};

use router::{NodeDescriptor, View};
use store::Store;

use crate::config::ClusterConfig;

/// Process-wide mutable state for one node: its view of the cluster, its
/// own shard membership, and its keyspace (spec.md §9 "Global mutable
/// state"). Handlers receive this explicitly rather than reaching for
/// globals.
pub struct NodeState {
    pub config: ClusterConfig,
    pub store: Arc<Store>,
    view: RwLock<View>,
    shard_name: RwLock<Option<String>>,
    shard_nodes: RwLock<Vec<NodeDescriptor>>,
}

impl NodeState {
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            config,
            store: Arc::new(Store::new()),
            view: RwLock::new(View::new()),
            shard_name: RwLock::new(None),
            shard_nodes: RwLock::new(Vec::new()),
        }
    }

    pub fn node_id(&self) -> i64 {
        self.config.node_id
    }

    pub fn view(&self) -> View {
        self.view.read().unwrap().clone()
    }

    pub fn is_online(&self) -> bool {
        !self.view.read().unwrap().is_empty()
    }

    /// This node's shard, if it belongs to one under the current view.
    pub fn shard_name(&self) -> Option<String> {
        self.shard_name.read().unwrap().clone()
    }

    pub fn shard_nodes(&self) -> Vec<NodeDescriptor> {
        self.shard_nodes.read().unwrap().clone()
    }

    /// Find the shard (if any) whose node list contains `node_id` under
    /// `view` (spec.md §4.8 step 1).
    pub fn find_membership(node_id: i64, view: &View) -> Option<(String, Vec<NodeDescriptor>)> {
        view.iter()
            .find(|(_, nodes)| nodes.iter().any(|n| n.id == node_id))
            .map(|(name, nodes)| (name.clone(), nodes.clone()))
    }

    /// Replace the view and recompute this node's shard membership by
    /// scanning for a shard whose node list contains `node_id` (spec.md
    /// §4.8 step 1-2). This is the simple, all-at-once form used outside
    /// of a real view-change (e.g. tests); [`crate::view::install_view`]
    /// uses [`Self::commit_view`] directly so it can redistribute keys
    /// against the *incoming* view before committing it.
    pub fn set_view(&self, new_view: View) -> View {
        let membership = Self::find_membership(self.node_id(), &new_view);
        let (name, nodes) = membership.unzip();
        let committed = if name.is_some() {
            new_view
        } else {
            View::new()
        };
        self.commit_view(committed, name, nodes.unwrap_or_default())
    }

    /// Commit an already-decided view/membership triple, returning the
    /// previous view.
    pub fn commit_view(
        &self,
        view: View,
        shard_name: Option<String>,
        shard_nodes: Vec<NodeDescriptor>,
    ) -> View {
        let previous = std::mem::replace(&mut *self.view.write().unwrap(), view);
        *self.shard_name.write().unwrap() = shard_name;
        *self.shard_nodes.write().unwrap() = shard_nodes;
        previous
    }
}
