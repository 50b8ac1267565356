use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::types::{SessionEntry, SessionKey};

/// Durable `map<SessionKey, SessionEntry>` backed by a single JSON file,
/// rewritten atomically (write-to-temp + rename) on every mutation.
///
/// All mutations are serialized through the `Mutex`; the lock is never held
/// across an await point because every method here is synchronous — callers
/// that need to await (e.g. the orchestrator) acquire the lock, copy what
/// they need, and release it before calling out.
pub struct SessionStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    /// Load (or lazily initialize) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    #[instrument(skip(self), fields(key = %key))]
    pub fn get(&self, key: &SessionKey) -> Option<SessionEntry> {
        self.entries.lock().unwrap().get(key.as_str()).cloned()
    }

    /// Create with a fresh UUID `sessionId` and `updatedAt = now` if absent.
    #[instrument(skip(self), fields(key = %key))]
    pub fn get_or_create(&self, key: &SessionKey, now_ms: i64) -> Result<SessionEntry> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries.get(key.as_str()) {
            return Ok(existing.clone());
        }
        debug!("creating session entry");
        let entry = SessionEntry::new(Uuid::new_v4().to_string(), now_ms);
        entries.insert(key.as_str().to_string(), entry.clone());
        drop(entries);
        self.flush()?;
        Ok(entry)
    }

    /// Apply a patch atomically. `mutate` receives the current (or freshly
    /// created) entry and returns the new value; it must not perform I/O.
    #[instrument(skip(self, mutate), fields(key = %key))]
    pub fn patch(
        &self,
        key: &SessionKey,
        now_ms: i64,
        mutate: impl FnOnce(&mut SessionEntry) -> Result<()>,
    ) -> Result<SessionEntry> {
        let mut entries = self.entries.lock().unwrap();

        let mut entry = entries
            .get(key.as_str())
            .cloned()
            .unwrap_or_else(|| SessionEntry::new(Uuid::new_v4().to_string(), now_ms));

        mutate(&mut entry)?;
        entry.updated_at = now_ms;

        if let Some(label) = &entry.label {
            let conflict = entries
                .iter()
                .any(|(k, v)| k != key.as_str() && v.label.as_deref() == Some(label.as_str()));
            if conflict {
                return Err(SessionError::LabelTaken(label.clone()));
            }
        }

        entries.insert(key.as_str().to_string(), entry.clone());
        drop(entries);
        self.flush()?;
        Ok(entry)
    }

    #[instrument(skip(self), fields(key = %key))]
    pub fn delete(&self, key: &SessionKey) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key.as_str());
        drop(entries);
        self.flush()
    }

    /// List entries sorted by `updatedAt` descending, optionally scoped to a
    /// `spawnedBy` parent (used for sandboxed subagent visibility).
    pub fn list(&self, filter: ListFilter) -> Vec<(SessionKey, SessionEntry)> {
        let entries = self.entries.lock().unwrap();
        let mut out: Vec<(SessionKey, SessionEntry)> = entries
            .iter()
            .filter(|(_, e)| {
                if let Some(parent) = &filter.spawned_by {
                    e.spawned_by.as_deref() == Some(parent.as_str())
                } else {
                    true
                }
            })
            .filter(|(_, e)| match filter.active_minutes {
                Some(mins) => {
                    let cutoff = filter.now_ms - (mins as i64) * 60_000;
                    e.updated_at >= cutoff
                }
                None => true,
            })
            .filter_map(|(k, e)| SessionKey::parse(k).ok().map(|key| (key, e.clone())))
            .collect();
        out.sort_by(|a, b| b.1.updated_at.cmp(&a.1.updated_at));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        out
    }

    /// Resolve `main`, a label (case-insensitive), or a raw key string.
    pub fn resolve(&self, agent_id: &str, display: &str) -> Option<SessionKey> {
        if display.eq_ignore_ascii_case("main") {
            return Some(SessionKey::main(agent_id));
        }
        if let Ok(key) = SessionKey::parse(display) {
            return Some(key);
        }
        let entries = self.entries.lock().unwrap();
        let needle = display.to_ascii_lowercase();
        entries
            .iter()
            .find(|(_, e)| {
                e.label
                    .as_deref()
                    .map(|l| l.to_ascii_lowercase() == needle)
                    .unwrap_or(false)
            })
            .and_then(|(k, _)| SessionKey::parse(k).ok())
    }

    fn flush(&self) -> Result<()> {
        let entries = self.entries.lock().unwrap();
        let serialized = serde_json::to_vec_pretty(&*entries)?;
        drop(entries);

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

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub limit: Option<usize>,
    pub active_minutes: Option<u64>,
    pub spawned_by: Option<String>,
    pub now_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn get_or_create_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("sessions.json")).unwrap();
        let key = SessionKey::main("support");
        let first = store.get_or_create(&key, 1000).unwrap();
        let second = store.get_or_create(&key, 2000).unwrap();
        assert_eq!(first.session_id, second.session_id);
    }

    #[test]
    fn patch_rejects_duplicate_label() {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("sessions.json")).unwrap();
        let a = SessionKey::main("support");
        let b = SessionKey::direct("support", "telegram", "acct", "user1");

        store
            .patch(&a, 1000, |e| {
                e.label = Some("ops".to_string());
                Ok(())
            })
            .unwrap();

        let result = store.patch(&b, 1000, |e| {
            e.label = Some("ops".to_string());
            Ok(())
        });
        assert!(matches!(result, Err(SessionError::LabelTaken(_))));
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("sessions.json")).unwrap();
        let key = SessionKey::main("support");
        store.delete(&key).unwrap();
        store.get_or_create(&key, 1000).unwrap();
        store.delete(&key).unwrap();
        store.delete(&key).unwrap();
        assert!(store.get(&key).is_none());
    }

    #[test]
    fn resolve_main_alias() {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("sessions.json")).unwrap();
        assert_eq!(
            store.resolve("support", "main"),
            Some(SessionKey::main("support"))
        );
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let key = SessionKey::main("support");
        {
            let store = SessionStore::open(&path).unwrap();
            store.get_or_create(&key, 1000).unwrap();
        }
        let reopened = SessionStore::open(&path).unwrap();
        assert!(reopened.get(&key).is_some());
    }
}
