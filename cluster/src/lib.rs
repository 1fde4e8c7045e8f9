//! Cluster-facing state and protocols for one node: the view manager
//! (spec.md §4.8), the convergence engine (§4.6), the gossip driver (§4.7),
//! and the peer client used by all three plus the request handler's
//! cross-shard forward (§4.3/§4.4).

pub mod config;
pub mod convergence;
pub mod gossip;
pub mod peer_client;
pub mod state;
pub mod view;
pub mod wire;

pub use config::ClusterConfig;
pub use gossip::GossipDriver;
pub use peer_client::PeerClient;
pub use state::NodeState;
