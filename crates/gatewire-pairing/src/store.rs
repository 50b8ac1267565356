use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::instrument;
use uuid::Uuid;

use crate::error::{PairingError, Result};
use crate::types::{PairedNode, PairingData, PendingPair};

const PAIRING_EXPIRY_MS: i64 = 5 * 60 * 1000;

/// Atomically persisted `{pending, paired}` pairing store, rewritten
/// write-to-temp + rename on every mutation.
pub struct PairingStore {
    path: PathBuf,
    data: Mutex<PairingData>,
}

impl PairingStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                PairingData::default()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            PairingData::default()
        };
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    #[instrument(skip(self), fields(node_id))]
    pub fn request_pairing(
        &self,
        node_id: &str,
        display_name: Option<String>,
        platform: Option<String>,
        version: Option<String>,
        remote_ip: Option<String>,
        now_ms: i64,
    ) -> Result<PendingPair> {
        let request = PendingPair {
            request_id: Uuid::new_v4().to_string(),
            node_id: node_id.to_string(),
            display_name,
            platform,
            version,
            remote_ip,
            requested_at_ms: now_ms,
        };
        {
            let mut data = self.data.lock().unwrap();
            data.pending.push(request.clone());
        }
        self.flush()?;
        Ok(request)
    }

    pub fn list_pending(&self) -> Vec<PendingPair> {
        self.data.lock().unwrap().pending.clone()
    }

    pub fn list_paired(&self) -> Vec<PairedNode> {
        self.data.lock().unwrap().paired.clone()
    }

    /// Promotes a pending request to a paired node with a fresh opaque
    /// token, unless it expired more than five minutes after being filed.
    pub fn approve(&self, request_id: &str, scopes: Vec<String>, now_ms: i64) -> Result<String> {
        let token = new_token();
        {
            let mut data = self.data.lock().unwrap();
            let idx = data
                .pending
                .iter()
                .position(|p| p.request_id == request_id)
                .ok_or_else(|| PairingError::RequestNotFound(request_id.to_string()))?;
            let request = data.pending.remove(idx);
            if now_ms - request.requested_at_ms > PAIRING_EXPIRY_MS {
                return Err(PairingError::Expired);
            }
            data.paired.retain(|n| n.node_id != request.node_id);
            data.paired.push(PairedNode {
                node_id: request.node_id,
                token: token.clone(),
                display_name: request.display_name,
                platform: request.platform,
                approved_at_ms: now_ms,
                scopes,
            });
        }
        self.flush()?;
        Ok(token)
    }

    pub fn reject(&self, request_id: &str) -> Result<()> {
        {
            let mut data = self.data.lock().unwrap();
            let before = data.pending.len();
            data.pending.retain(|p| p.request_id != request_id);
            if data.pending.len() == before {
                return Err(PairingError::RequestNotFound(request_id.to_string()));
            }
        }
        self.flush()
    }

    pub fn revoke(&self, node_id: &str) -> Result<()> {
        {
            let mut data = self.data.lock().unwrap();
            let before = data.paired.len();
            data.paired.retain(|n| n.node_id != node_id);
            if data.paired.len() == before {
                return Err(PairingError::NodeNotFound(node_id.to_string()));
            }
        }
        self.flush()
    }

    /// Generates a new token for an already-paired node, invalidating the
    /// previous one.
    pub fn rotate_token(&self, node_id: &str) -> Result<String> {
        let token = new_token();
        {
            let mut data = self.data.lock().unwrap();
            let node = data
                .paired
                .iter_mut()
                .find(|n| n.node_id == node_id)
                .ok_or_else(|| PairingError::NodeNotFound(node_id.to_string()))?;
            node.token = token.clone();
        }
        self.flush()?;
        Ok(token)
    }

    pub fn verify_token(&self, node_id: &str, token: &str) -> Option<PairedNode> {
        self.data
            .lock()
            .unwrap()
            .paired
            .iter()
            .find(|n| n.node_id == node_id && n.token == token)
            .cloned()
    }

    fn flush(&self) -> Result<()> {
        let data = self.data.lock().unwrap();
        let serialized = serde_json::to_vec_pretty(&*data)?;
        drop(data);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let mut tmp = fs::File::create(&tmp_path)?;
        tmp.write_all(&serialized)?;
        tmp.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn new_token() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn approve_then_verify_returns_paired_node() {
        let dir = tempdir().unwrap();
        let store = PairingStore::open(dir.path().join("pairing.json")).unwrap();
        let req = store
            .request_pairing("node-1", None, None, None, None, 1_000)
            .unwrap();
        let token = store
            .approve(&req.request_id, vec!["operator.read".to_string()], 1_500)
            .unwrap();
        let node = store.verify_token("node-1", &token).unwrap();
        assert_eq!(node.node_id, "node-1");
        assert!(store.list_pending().is_empty());
    }

    #[test]
    fn revoke_then_verify_returns_none() {
        let dir = tempdir().unwrap();
        let store = PairingStore::open(dir.path().join("pairing.json")).unwrap();
        let req = store
            .request_pairing("node-1", None, None, None, None, 1_000)
            .unwrap();
        let token = store.approve(&req.request_id, vec![], 1_500).unwrap();
        store.revoke("node-1").unwrap();
        assert!(store.verify_token("node-1", &token).is_none());
    }

    #[test]
    fn rotation_invalidates_previous_token() {
        let dir = tempdir().unwrap();
        let store = PairingStore::open(dir.path().join("pairing.json")).unwrap();
        let req = store
            .request_pairing("node-1", None, None, None, None, 1_000)
            .unwrap();
        let old_token = store.approve(&req.request_id, vec![], 1_500).unwrap();
        let new_token = store.rotate_token("node-1").unwrap();
        assert!(store.verify_token("node-1", &old_token).is_none());
        assert!(store.verify_token("node-1", &new_token).is_some());
    }

    #[test]
    fn approve_past_expiry_window_fails() {
        let dir = tempdir().unwrap();
        let store = PairingStore::open(dir.path().join("pairing.json")).unwrap();
        let req = store
            .request_pairing("node-1", None, None, None, None, 0)
            .unwrap();
        let six_minutes_ms = 6 * 60 * 1000;
        let err = store
            .approve(&req.request_id, vec![], six_minutes_ms)
            .unwrap_err();
        assert!(matches!(err, PairingError::Expired));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pairing.json");
        {
            let store = PairingStore::open(&path).unwrap();
            let req = store
                .request_pairing("node-1", None, None, None, None, 1_000)
                .unwrap();
            store.approve(&req.request_id, vec![], 1_500).unwrap();
        }
        let reopened = PairingStore::open(&path).unwrap();
        assert_eq!(reopened.list_paired().len(), 1);
    }
}
