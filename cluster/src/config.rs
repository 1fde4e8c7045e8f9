use std::time::Duration;

use snafu::{OptionExt, ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("NODE_IDENTIFIER env var is required and must be an integer"))]
    MissingNodeIdentifier { source: std::num::ParseIntError },
    #[snafu(display("NODE_IDENTIFIER env var is required"))]
    NodeIdentifierNotSet,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Node configuration loaded from the environment (spec.md §6, §4.11 of
/// SPEC_FULL.md). Only `NODE_IDENTIFIER` is required; everything else
/// falls back to a sane default on absence or parse failure.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub node_id: i64,
    pub bind_addr: String,
    pub gossip_interval: Duration,
    pub gossip_fanout: usize,
    pub causal_wait_interval: Duration,
    pub forward_timeout: Duration,
}

impl ClusterConfig {
    pub fn from_env() -> Result<Self> {
        let node_id_raw = std::env::var("NODE_IDENTIFIER")
            .ok()
            .context(NodeIdentifierNotSetSnafu)?;
        let node_id: i64 = node_id_raw
            .parse()
            .context(MissingNodeIdentifierSnafu)?;

        Ok(Self {
            node_id,
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8081"),
            gossip_interval: Duration::from_millis(env_parsed_or("GOSSIP_INTERVAL_MS", 2000)),
            gossip_fanout: env_parsed_or("GOSSIP_FANOUT", 2),
            causal_wait_interval: Duration::from_millis(env_parsed_or("CAUSAL_WAIT_MS", 200)),
            forward_timeout: Duration::from_millis(env_parsed_or("FORWARD_TIMEOUT_MS", 2000)),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| {
            if std::env::var(key).is_ok() {
                log::warn!("failed to parse env var {key}, using default");
            }
            default
        })
}
