use std::time::Duration;

use log::error;
use router::NodeDescriptor;
use store::Entry;

use crate::wire::{AcceptKeyRequestBody, ConvergeRequestBody};

/// Outbound HTTP client shared by the view manager, gossip driver, and
/// request handler for all inter-node calls (SPEC_FULL.md §4.12): shard
/// forwards, gossip pushes, and key transfers.
#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    forward_timeout: Duration,
}

impl PeerClient {
    pub fn new(forward_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            forward_timeout,
        }
    }

    /// Forward a client PUT to `node`, returning its response verbatim
    /// (spec.md §4.3 step 3).
    pub async fn forward_put(
        &self,
        node: &NodeDescriptor,
        key: &str,
        body: &serde_json::Value,
    ) -> reqwest::Result<reqwest::Response> {
        self.http
            .put(node.endpoint().url(&format!("/data/{key}")))
            .timeout(self.forward_timeout)
            .json(body)
            .send()
            .await
    }

    /// Forward a client GET to `node`, passing causal metadata via the
    /// `X-Causal-Metadata` header as the original client would (spec.md
    /// §4.4 step 2, §6).
    pub async fn forward_get(
        &self,
        node: &NodeDescriptor,
        key: &str,
        causal_metadata_header: &str,
    ) -> reqwest::Result<reqwest::Response> {
        self.http
            .get(node.endpoint().url(&format!("/data/{key}")))
            .timeout(self.forward_timeout)
            .header("X-Causal-Metadata", causal_metadata_header)
            .send()
            .await
    }

    /// Forward a client GET /data (list-all) to `node`.
    pub async fn forward_list(
        &self,
        node: &NodeDescriptor,
        body: &serde_json::Value,
    ) -> reqwest::Result<reqwest::Response> {
        self.http
            .get(node.endpoint().url("/data"))
            .timeout(self.forward_timeout)
            .json(body)
            .send()
            .await
    }

    /// Push this node's full snapshot to one shard-mate (spec.md §4.7).
    /// Failures are logged and swallowed — gossip correctness depends only
    /// on eventual delivery via repetition, never on this call succeeding.
    pub async fn push_converge(&self, node: &NodeDescriptor, kvs: ConvergeRequestBody) {
        let result = self
            .http
            .post(node.endpoint().url("/internal/converge"))
            .json(&kvs)
            .send()
            .await;
        if let Err(e) = result {
            error!("gossip push to {} failed: {e}", node.address);
        }
    }

    /// Transfer one key to every node of its new owning shard (spec.md
    /// §4.8 step 3). Errors are logged and otherwise ignored — the caller
    /// proceeds to delete the key locally regardless.
    pub async fn send_key(&self, nodes: &[NodeDescriptor], key: &str, entry: &Entry) {
        let body = AcceptKeyRequestBody::from_entry(key.to_string(), entry.clone());
        for node in nodes {
            let result = self
                .http
                .post(node.endpoint().url("/internal/acceptKey"))
                .json(&body)
                .send()
                .await;
            if let Err(e) = result {
                error!("key transfer of {key} to {} failed: {e}", node.address);
            }
        }
    }

    pub fn pick_forward_target(nodes: &[NodeDescriptor]) -> Option<&NodeDescriptor> {
        use rand::seq::SliceRandom;
        nodes.choose(&mut rand::thread_rng())
    }

    pub fn pick_gossip_targets(nodes: &[NodeDescriptor], fanout: usize) -> Vec<NodeDescriptor> {
        use rand::seq::SliceRandom;
        let mut rng = rand::thread_rng();
        nodes
            .choose_multiple(&mut rng, fanout.min(nodes.len()))
            .cloned()
            .collect()
    }
}
