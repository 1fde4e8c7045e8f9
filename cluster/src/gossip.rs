use std::sync::Arc;

use log::{info, warn};
use tokio::sync::mpsc;
use tokio::time;

use crate::peer_client::PeerClient;
use crate::state::NodeState;
use crate::wire::ConvergeRequestBody;

/// The background task that periodically pushes this node's local store
/// to a random sample of its shard-mates (spec.md §4.7). Modeled on the
/// same spawn-a-loop-with-a-stop-channel shape used elsewhere in this
/// codebase for long-running background work.
pub struct GossipDriver {
    stop_tx: mpsc::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

impl GossipDriver {
    pub fn start(state: Arc<NodeState>, peer: PeerClient) -> Self {
        let interval = state.config.gossip_interval;
        let fanout = state.config.gossip_fanout;
        let (stop_tx, mut stop_rx) = mpsc::channel(1);

        let handle = tokio::spawn(async move {
            loop {
                if time::timeout(interval, stop_rx.recv()).await.is_ok() {
                    warn!("gossip driver received stop signal, exiting");
                    break;
                }
                gossip_once(&state, &peer, fanout).await;
            }
        });

        Self { stop_tx, handle }
    }

    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        let _ = self.handle.await;
    }
}

/// One gossip round: if the node is online, push a snapshot of the local
/// store to up to `fanout` randomly chosen shard-mates (excluding self).
pub async fn gossip_once(state: &NodeState, peer: &PeerClient, fanout: usize) {
    if !state.is_online() {
        return;
    }

    let node_id = state.node_id();
    let peers: Vec<_> = state
        .shard_nodes()
        .into_iter()
        .filter(|n| n.id != node_id)
        .collect();
    if peers.is_empty() {
        return;
    }

    let targets = PeerClient::pick_gossip_targets(&peers, fanout);
    info!("gossiping to {} peer(s)", targets.len());

    let body = ConvergeRequestBody {
        kvs: state.store.snapshot(),
    };
    for target in targets {
        peer.push_converge(&target, body.clone()).await;
    }
}
