use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};

/// Tool-call-id charset accepted by the target provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdMode {
    /// `[a-zA-Z0-9_-]`
    Standard,
    /// `[a-zA-Z0-9]`
    Strict,
}

/// Map raw tool-call ids onto provider-safe tokens. Stable: the same raw id
/// always maps to the same output. Collision-resistant: two different raw
/// ids that sanitize to the same candidate get distinct outputs, the second
/// (and any further) suffixed with a short hash of the original.
pub fn sanitize_tool_call_ids(ids: &[String], mode: IdMode) -> Vec<String> {
    let mut cache: HashMap<&str, String> = HashMap::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(ids.len());

    for raw in ids {
        if let Some(existing) = cache.get(raw.as_str()) {
            out.push(existing.clone());
            continue;
        }

        let mut candidate = sanitize_chars(raw, mode);
        if candidate.is_empty() {
            candidate = "id".to_string();
        }
        if used.contains(&candidate) {
            candidate = format!("{candidate}-{}", short_hash(raw));
            let mut suffix = 1u32;
            while used.contains(&candidate) {
                candidate = format!("{candidate}{suffix}");
                suffix += 1;
            }
        }

        used.insert(candidate.clone());
        cache.insert(raw.as_str(), candidate.clone());
        out.push(candidate);
    }

    out
}

fn sanitize_chars(raw: &str, mode: IdMode) -> String {
    raw.chars()
        .filter(|c| match mode {
            IdMode::Standard => c.is_ascii_alphanumeric() || *c == '_' || *c == '-',
            IdMode::Strict => c.is_ascii_alphanumeric(),
        })
        .collect()
}

fn short_hash(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(&digest[..4])
}
