use std::sync::Arc;

use async_trait::async_trait;
use gatewire_agent::{ToolCall, ToolDefinition, ToolExecutor, ToolResult};
use gatewire_channels::{CanonicalTarget, ChannelRegistry, ReplyPayload};
use gatewire_core::config::RetryConfig;
use tracing::warn;

/// Name of the built-in tool that lets the agent message a target directly,
/// mid-turn, independent of whatever the turn's final reply ends up being.
pub const SEND_MESSAGE_TOOL: &str = "send_message";

/// Schema for [`SEND_MESSAGE_TOOL`], handed to the provider alongside every
/// other attached tool so the model knows how to call it.
pub fn send_message_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: SEND_MESSAGE_TOOL.to_string(),
        description: "Send a message to a channel target right away, before the turn finishes."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "channel": {"type": "string"},
                "account_id": {"type": "string"},
                "to": {"type": "string"},
                "text": {"type": "string"},
            },
            "required": ["channel", "account_id", "to", "text"],
        }),
    }
}

/// Dispatches `send_message` tool calls straight through the channel
/// registry. On success the result encodes the normalized target reached
/// (channel, account, canonical id) as JSON so the pipeline can feed it into
/// a [`gatewire_delivery::SentTargetTracker`] and suppress a redundant final
/// reply aimed at the same place.
pub struct MessagingToolExecutor {
    pub channels: Arc<ChannelRegistry>,
    pub retry: RetryConfig,
}

#[async_trait]
impl ToolExecutor for MessagingToolExecutor {
    async fn execute(&self, call: &ToolCall) -> ToolResult {
        if call.name != SEND_MESSAGE_TOOL {
            return ToolResult {
                call_id: call.id.clone(),
                output: format!("unknown tool {}", call.name),
                is_error: true,
            };
        }

        let channel = call.input.get("channel").and_then(|v| v.as_str()).unwrap_or_default();
        let account_id = call.input.get("account_id").and_then(|v| v.as_str()).unwrap_or_default();
        let to = call.input.get("to").and_then(|v| v.as_str()).unwrap_or_default();
        let text = call.input.get("text").and_then(|v| v.as_str()).unwrap_or_default();

        let Some(plugin) = self.channels.get(channel) else {
            return ToolResult {
                call_id: call.id.clone(),
                output: format!("no plugin registered for channel {channel}"),
                is_error: true,
            };
        };

        let target = CanonicalTarget(to.to_string());
        let payload = ReplyPayload::text(text);
        match gatewire_delivery::deliver(plugin, &target, &payload, &self.retry).await {
            Ok(_) => ToolResult {
                call_id: call.id.clone(),
                output: serde_json::json!({
                    "sent_to": {"channel": channel, "account_id": account_id, "canonical_id": to},
                })
                .to_string(),
                is_error: false,
            },
            Err(err) => {
                warn!(err = %err, channel, "send_message tool failed");
                ToolResult {
                    call_id: call.id.clone(),
                    output: format!("send failed: {err}"),
                    is_error: true,
                }
            }
        }
    }
}

/// Parses a [`MessagingToolExecutor`] success payload back into its target
/// triple, if `output` is one. Anything else (error text, a different
/// tool's output) is ignored.
pub fn parse_sent_target(output: &str) -> Option<(String, String, String)> {
    let value: serde_json::Value = serde_json::from_str(output).ok()?;
    let sent_to = value.get("sent_to")?;
    let channel = sent_to.get("channel")?.as_str()?.to_string();
    let account_id = sent_to.get("account_id")?.as_str()?.to_string();
    let canonical_id = sent_to.get("canonical_id")?.as_str()?.to_string();
    Some((channel, account_id, canonical_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_send_result() {
        let output = serde_json::json!({
            "sent_to": {"channel": "discord", "account_id": "acct-1", "canonical_id": "12345"}
        })
        .to_string();
        let parsed = parse_sent_target(&output).unwrap();
        assert_eq!(parsed, ("discord".to_string(), "acct-1".to_string(), "12345".to_string()));
    }

    #[test]
    fn ignores_non_matching_output() {
        assert!(parse_sent_target("send failed: timeout").is_none());
        assert!(parse_sent_target("{}").is_none());
    }
}
