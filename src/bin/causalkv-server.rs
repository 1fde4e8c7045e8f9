//! Node entry point: load configuration from the environment, bring up the
//! cluster state and background gossip driver, then serve the HTTP API
//! until the process is asked to stop.

use std::process::ExitCode;
use std::sync::Arc;

use cluster::{ClusterConfig, GossipDriver, NodeState, PeerClient};
use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let config = match ClusterConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!("starting node {} on {}", config.node_id, config.bind_addr);

    let bind_addr = config.bind_addr.clone();
    let forward_timeout = config.forward_timeout;
    let state = Arc::new(NodeState::new(config));
    let peer = PeerClient::new(forward_timeout);

    let gossip = GossipDriver::start(state.clone(), peer.clone());

    let mut http = match server::Builder::new()
        .bind_addr(bind_addr)
        .state(state)
        .peer(peer)
        .build()
    {
        Ok(service) => service,
        Err(e) => {
            error!("failed to build http service: {e}");
            gossip.stop().await;
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = http.start().await {
        error!("failed to start http service: {e}");
        gossip.stop().await;
        return ExitCode::FAILURE;
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }
    info!("shutting down");
    http.stop();
    gossip.stop().await;

    ExitCode::SUCCESS
}
