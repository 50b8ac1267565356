use std::collections::HashSet;

/// Tracks targets the agent already reached through an in-turn messaging
/// tool, so the dispatcher can suppress a redundant reply payload aimed at
/// the same place. Matching is by normalized target only — full text
/// equality is not required, and isn't checked.
#[derive(Debug, Default)]
pub struct SentTargetTracker {
    seen: HashSet<String>,
}

impl SentTargetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(channel: &str, account_id: &str, canonical_id: &str) -> String {
        format!("{channel}:{account_id}:{canonical_id}")
    }

    pub fn mark_sent(&mut self, channel: &str, account_id: &str, canonical_id: &str) {
        self.seen.insert(Self::key(channel, account_id, canonical_id));
    }

    pub fn already_sent(&self, channel: &str, account_id: &str, canonical_id: &str) -> bool {
        self.seen.contains(&Self::key(channel, account_id, canonical_id))
    }
}
