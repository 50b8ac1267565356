use async_trait::async_trait;

use crate::{
    error::ChannelError,
    types::{Capability, CanonicalTarget, ChannelStatus, GroupInfo, MsgContext, PeerInfo, ReplyPayload, SendOpts, SendResult},
};

/// Common interface implemented by every channel plugin (Telegram, Discord,
/// WebChat, …). The core never inspects a plugin beyond this contract.
#[async_trait]
pub trait ChannelPlugin: Send + Sync {
    /// Stable lowercase identifier (e.g. `"telegram"`). Unique across the
    /// registry.
    fn id(&self) -> &str;

    /// Alternate identifiers accepted by `normalizeChannelId`.
    fn aliases(&self) -> &[String] {
        &[]
    }

    /// Display rank; lower sorts first in `listChannelPlugins`.
    fn order(&self) -> i32 {
        0
    }

    fn capabilities(&self) -> &[Capability];

    /// Default chunk limit; per-channel config may override.
    fn max_text_chars(&self) -> usize;

    fn supports_markdown(&self) -> bool {
        false
    }
    fn supports_threading(&self) -> bool {
        false
    }
    fn supports_blocks(&self) -> bool {
        false
    }

    /// Resolve a raw platform-specific reference into a canonical target,
    /// e.g. for send-from-agent routing. `None` when unrecognized.
    fn normalize_target(&self, _raw: &str) -> Option<CanonicalTarget> {
        None
    }

    async fn list_peers(&self) -> Result<Vec<PeerInfo>, ChannelError> {
        Ok(Vec::new())
    }

    async fn list_groups(&self) -> Result<Vec<GroupInfo>, ChannelError> {
        Ok(Vec::new())
    }

    async fn connect(&mut self) -> Result<(), ChannelError>;
    async fn disconnect(&mut self) -> Result<(), ChannelError>;

    async fn send(
        &self,
        target: &CanonicalTarget,
        payload: &ReplyPayload,
        opts: &SendOpts,
    ) -> Result<SendResult, ChannelError>;

    fn status(&self) -> ChannelStatus;

    /// Mention-of-self detection. Defaults to a case-insensitive substring
    /// match of `@<selfId>`; channels with richer entity metadata (structured
    /// mention spans, platform IDs) should override this.
    fn has_mention(&self, msg: &MsgContext, self_id: &str) -> bool {
        let needle = format!("@{self_id}").to_ascii_lowercase();
        msg.body.to_ascii_lowercase().contains(&needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatType;

    struct FakePlugin;

    #[async_trait]
    impl ChannelPlugin for FakePlugin {
        fn id(&self) -> &str {
            "fake"
        }
        fn capabilities(&self) -> &[Capability] {
            &[Capability::Send]
        }
        fn max_text_chars(&self) -> usize {
            4000
        }
        async fn connect(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }
        async fn disconnect(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }
        async fn send(
            &self,
            _target: &CanonicalTarget,
            _payload: &ReplyPayload,
            _opts: &SendOpts,
        ) -> Result<SendResult, ChannelError> {
            Ok(SendResult {
                message_id: "1".to_string(),
                channel_id: "fake".to_string(),
            })
        }
        fn status(&self) -> ChannelStatus {
            ChannelStatus::Connected
        }
    }

    fn fake_msg(body: &str) -> MsgContext {
        MsgContext {
            body: body.to_string(),
            from: "u1".to_string(),
            to: "bot".to_string(),
            channel: "fake".to_string(),
            account_id: "acct".to_string(),
            chat_type: ChatType::Group,
            message_sid: "m1".to_string(),
            timestamp: 0,
            sender_name: None,
            group_subject: None,
            media_path: Vec::new(),
            media_url: Vec::new(),
            media_remote_host: None,
            is_heartbeat: false,
            thread_id: None,
        }
    }

    #[test]
    fn default_has_mention_matches_case_insensitive() {
        let plugin = FakePlugin;
        assert!(plugin.has_mention(&fake_msg("hey @Bot can you help"), "bot"));
        assert!(!plugin.has_mention(&fake_msg("no mention here"), "bot"));
    }
}
