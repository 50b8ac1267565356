use serde::{Deserialize, Serialize};

/// A pairing request awaiting operator approval. Expires 5 minutes after
/// `requested_at_ms` if nobody approves it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingPair {
    pub request_id: String,
    pub node_id: String,
    pub display_name: Option<String>,
    pub platform: Option<String>,
    pub version: Option<String>,
    pub remote_ip: Option<String>,
    pub requested_at_ms: i64,
}

/// A node that has completed pairing and holds a live token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PairedNode {
    pub node_id: String,
    pub token: String,
    pub display_name: Option<String>,
    pub platform: Option<String>,
    pub approved_at_ms: i64,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PairingData {
    pub pending: Vec<PendingPair>,
    pub paired: Vec<PairedNode>,
}
