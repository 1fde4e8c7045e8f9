use std::sync::Arc;

use cluster::{NodeState, PeerClient};

/// Everything a request handler needs, bundled so warp filters can inject
/// it with a single `with_*` combinator (spec.md §9 "model as a per-node
/// `NodeState` value ... handlers receive it explicitly").
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<NodeState>,
    pub peer: PeerClient,
}

impl AppContext {
    pub fn new(state: Arc<NodeState>, peer: PeerClient) -> Self {
        Self { state, peer }
    }
}
