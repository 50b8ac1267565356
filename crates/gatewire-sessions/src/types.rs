use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, SessionError};

/// Canonical reply-lane identifier.
///
/// Derived from `(channel, accountId, chatType, remoteId, agentId)`, never
/// from a user identity — two different people messaging the same DM lane
/// share a session, which is the point: the lane is what has continuity,
/// not the person.
///
/// Grammar:
/// - `agent:<agentId>:main` — the default lane for an agent.
/// - `agent:<agentId>:<channel>:<accountId>:<remote>` — direct-message lane.
/// - `agent:<agentId>:group:<channel>:<accountId>:<groupId>` — group lane.
/// - `agent:<agentId>:subagent:<uuid>` — an ephemeral child of a parent turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn main(agent_id: &str) -> Self {
        Self(format!("agent:{agent_id}:main"))
    }

    pub fn direct(agent_id: &str, channel: &str, account_id: &str, remote: &str) -> Self {
        Self(format!("agent:{agent_id}:{channel}:{account_id}:{remote}"))
    }

    pub fn group(agent_id: &str, channel: &str, account_id: &str, group_id: &str) -> Self {
        Self(format!(
            "agent:{agent_id}:group:{channel}:{account_id}:{group_id}"
        ))
    }

    pub fn subagent(agent_id: &str, id: &str) -> Self {
        Self(format!("agent:{agent_id}:subagent:{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_subagent(&self) -> bool {
        matches!(self.kind(), Some(SessionKeyKind::Subagent { .. }))
    }

    /// Parse the lane, validating the `agent:` prefix and a non-empty tail.
    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("agent:")
            .ok_or_else(|| SessionError::InvalidKey(format!("missing 'agent:' prefix: {s}")))?;
        if rest.split(':').next().unwrap_or("").is_empty() {
            return Err(SessionError::InvalidKey(format!("missing agent id: {s}")));
        }
        Ok(Self(s.to_string()))
    }

    /// Classify the lane into its structural parts.
    pub fn kind(&self) -> Option<SessionKeyKind> {
        let rest = self.0.strip_prefix("agent:")?;
        let mut parts = rest.splitn(2, ':');
        let agent_id = parts.next()?.to_string();
        let tail = parts.next()?;

        if tail == "main" {
            return Some(SessionKeyKind::Main { agent_id });
        }
        if let Some(sub) = tail.strip_prefix("subagent:") {
            return Some(SessionKeyKind::Subagent {
                agent_id,
                id: sub.to_string(),
            });
        }
        if let Some(group_tail) = tail.strip_prefix("group:") {
            let mut gp = group_tail.splitn(3, ':');
            let channel = gp.next()?.to_string();
            let account_id = gp.next()?.to_string();
            let group_id = gp.next()?.to_string();
            return Some(SessionKeyKind::Group {
                agent_id,
                channel,
                account_id,
                group_id,
            });
        }
        let mut dp = tail.splitn(3, ':');
        let channel = dp.next()?.to_string();
        let account_id = dp.next()?.to_string();
        let remote = dp.next()?.to_string();
        Some(SessionKeyKind::Direct {
            agent_id,
            channel,
            account_id,
            remote,
        })
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKeyKind {
    Main {
        agent_id: String,
    },
    Direct {
        agent_id: String,
        channel: String,
        account_id: String,
        remote: String,
    },
    Group {
        agent_id: String,
        channel: String,
        account_id: String,
        group_id: String,
    },
    Subagent {
        agent_id: String,
        id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThinkingLevel {
    Minimal,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnOff {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasoningLevel {
    On,
    Off,
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SendPolicy {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupActivation {
    Mention,
    Always,
}

/// The persisted per-session record. See `SessionPatch` for the mutation
/// shape used by `sessions.patch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    pub session_id: String,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_level: Option<ThinkingLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_level: Option<OnOff>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_level: Option<ReasoningLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevated_level: Option<OnOff>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_usage: Option<OnOff>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_policy: Option<SendPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_activation: Option<GroupActivation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_override: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_override: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_channel: Option<String>,

    /// The key of the parent session. Set exactly once, only for subagent keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawned_by: Option<String>,

    #[serde(default)]
    pub system_sent: bool,
    #[serde(default)]
    pub aborted_last_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_snapshot_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl SessionEntry {
    pub fn new(session_id: String, now_ms: i64) -> Self {
        Self {
            session_id,
            updated_at: now_ms,
            label: None,
            thinking_level: None,
            verbose_level: None,
            reasoning_level: None,
            elevated_level: None,
            response_usage: None,
            send_policy: None,
            group_activation: None,
            provider_override: None,
            model_override: None,
            last_provider: None,
            last_to: None,
            last_account_id: None,
            last_channel: None,
            spawned_by: None,
            system_sent: false,
            aborted_last_run: false,
            skills_snapshot_version: None,
            context_tokens: None,
            model: None,
        }
    }
}

/// Partial update for a `SessionEntry`. Every field distinguishes "omitted"
/// (leave alone) from "present and null" (clear) via `double_option`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub label: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub thinking_level: Option<Option<ThinkingLevel>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub verbose_level: Option<Option<OnOff>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub reasoning_level: Option<Option<ReasoningLevel>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub elevated_level: Option<Option<OnOff>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub response_usage: Option<Option<OnOff>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub send_policy: Option<Option<SendPolicy>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub group_activation: Option<Option<GroupActivation>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub provider_override: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub model_override: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub spawned_by: Option<Option<String>>,
}

/// Distinguishes a missing field from a field explicitly set to `null`.
/// Standard serde idiom for "PATCH" semantics.
fn double_option<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}
