use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::provider::{ChatRequest, LlmProvider, Message, ProviderError, Role, ToolCall, ToolDefinition};
use crate::sanitize::IdMode;
use crate::thinking::ThinkingLevel;
use crate::transcript::{prune_heartbeat_turns, sanitize_transcript_ids, wrap_external_content, TurnMessage};

/// A tool the invoker can dispatch on the model's behalf between provider
/// calls. The session/channel layer supplies the implementation; the
/// invoker only knows how to route a [`ToolCall`] to it and feed the result
/// back into the conversation.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, call: &ToolCall) -> ToolResult;
}

/// Outcome of running one tool call.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub call_id: String,
    pub output: String,
    pub is_error: bool,
}

/// Upper bound on provider round-trips within a single turn when the model
/// keeps requesting tools. Prevents a misbehaving tool loop from running
/// forever.
const MAX_TOOL_ROUNDS: u32 = 4;

/// Final disposition of a turn invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Ok,
    Aborted,
    Error,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input: u32,
    pub output: u32,
}

/// One piece of assistant-visible output produced during a turn, in the
/// order it was produced. A turn that calls tools before giving its final
/// answer yields more than one of these; a plain turn yields exactly one.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub text: String,
}

/// Everything C7 needs to run one turn. `history` is the transcript already
/// loaded for this session; the invoker prunes and sanitizes its own copy
/// and never mutates the caller's.
pub struct TurnRequest {
    pub history: Vec<TurnMessage>,
    pub batch_text: String,
    pub system_prompt: String,
    pub model: String,
    pub thinking: Option<ThinkingLevel>,
    pub id_mode: IdMode,
    /// Set when `batch_text` originated from an untrusted external source
    /// (webhook, RSS, …) and must be wrapped before reaching the model.
    pub external_source: Option<String>,
}

/// What a turn produced: an ordered list of reply segments plus the
/// transcript lines the caller should append (the invoker never writes to
/// storage itself). `replies` is the wire-level `InboundAck` contract in
/// provider-agnostic form — the channel layer turns each segment into a
/// `ReplyPayload`.
pub struct TurnOutcome {
    pub replies: Vec<TurnReply>,
    pub usage: Usage,
    pub model: String,
    pub provider: String,
    pub status: TurnStatus,
    pub new_messages: Vec<TurnMessage>,
}

impl TurnOutcome {
    /// Convenience accessor for callers that only care about the final
    /// segment's text (most do).
    pub fn reply_text(&self) -> &str {
        self.replies.last().map(|r| r.text.as_str()).unwrap_or("")
    }
}

/// Runs agent turns against a (possibly multi-provider, fallback-chained)
/// [`LlmProvider`]. One instance is shared across all sessions.
pub struct AgentTurnInvoker {
    provider: Box<dyn LlmProvider>,
    tools: Vec<ToolDefinition>,
    executor: Option<Arc<dyn ToolExecutor>>,
}

impl AgentTurnInvoker {
    pub fn new(provider: Box<dyn LlmProvider>) -> Self {
        Self { provider, tools: Vec::new(), executor: None }
    }

    /// Attach a tool catalogue and the executor that resolves calls against
    /// it. Turns run without either still work exactly as before: the
    /// provider simply never sees a non-empty tool list.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>, executor: Arc<dyn ToolExecutor>) -> Self {
        self.tools = tools;
        self.executor = Some(executor);
        self
    }

    /// Run one turn: prune heartbeats, sanitize tool-call ids, wrap
    /// untrusted input, call the provider, and return the transcript lines
    /// to persist regardless of outcome.
    ///
    /// When the model requests a tool, the result is dispatched through the
    /// attached [`ToolExecutor`] and fed back for another provider round,
    /// up to [`MAX_TOOL_ROUNDS`]. Each round's assistant text becomes its
    /// own ordered [`TurnReply`] segment, so a turn that talks through a
    /// tool call still surfaces its intermediate remarks to the caller in
    /// order, not just the final answer.
    pub async fn run_turn(
        &self,
        request: TurnRequest,
        cancel: CancellationToken,
    ) -> TurnOutcome {
        let mut history = prune_heartbeat_turns(request.history);
        sanitize_transcript_ids(&mut history, request.id_mode);

        let user_text = match &request.external_source {
            Some(source) => wrap_external_content(&request.batch_text, source),
            None => request.batch_text.clone(),
        };

        let user_message = TurnMessage {
            role: "user".to_string(),
            content: user_text.clone(),
            tool_call_id: None,
        };

        let mut messages: Vec<Message> = history
            .iter()
            .map(|m| Message {
                role: role_for(&m.role),
                content: m.content.clone(),
            })
            .collect();
        messages.push(Message {
            role: Role::User,
            content: user_text,
        });

        if cancel.is_cancelled() {
            return TurnOutcome {
                replies: Vec::new(),
                usage: Usage::default(),
                model: request.model,
                provider: self.provider.name().to_string(),
                status: TurnStatus::Aborted,
                new_messages: vec![user_message],
            };
        }

        let mut new_messages = vec![user_message];
        let mut replies = Vec::new();
        let mut usage = Usage::default();
        let mut last_model = request.model.clone();

        for round in 0..MAX_TOOL_ROUNDS {
            let chat_request = ChatRequest {
                model: request.model.clone(),
                system: request.system_prompt.clone(),
                messages: messages.clone(),
                max_tokens: 4096,
                stream: false,
                thinking: request.thinking,
                tools: self.tools.clone(),
                raw_messages: None,
            };

            info!(model = %chat_request.model, provider = %self.provider.name(), round, "invoking agent turn");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ProviderError::Cancelled),
                r = self.provider.send(&chat_request) => r,
            };

            let resp = match result {
                Ok(resp) => resp,
                Err(ProviderError::Cancelled) => {
                    return TurnOutcome {
                        replies,
                        usage,
                        model: last_model,
                        provider: self.provider.name().to_string(),
                        status: TurnStatus::Aborted,
                        new_messages,
                    };
                }
                Err(err) => {
                    warn!(err = %err, "agent turn failed");
                    return TurnOutcome {
                        replies,
                        usage,
                        model: last_model,
                        provider: self.provider.name().to_string(),
                        status: TurnStatus::Error,
                        new_messages,
                    };
                }
            };

            last_model = resp.model.clone();
            usage.input += resp.tokens_in;
            usage.output += resp.tokens_out;

            new_messages.push(TurnMessage {
                role: "assistant".to_string(),
                content: resp.content.clone(),
                tool_call_id: resp.tool_calls.first().map(|c| c.id.clone()),
            });
            messages.push(Message { role: Role::Assistant, content: resp.content.clone() });

            if !resp.content.trim().is_empty() {
                replies.push(TurnReply { text: resp.content.clone() });
            }

            if resp.tool_calls.is_empty() {
                return TurnOutcome {
                    replies,
                    usage,
                    model: last_model,
                    provider: self.provider.name().to_string(),
                    status: TurnStatus::Ok,
                    new_messages,
                };
            }

            let Some(executor) = &self.executor else {
                warn!("model requested a tool but no executor is attached, ending turn early");
                return TurnOutcome {
                    replies,
                    usage,
                    model: last_model,
                    provider: self.provider.name().to_string(),
                    status: TurnStatus::Ok,
                    new_messages,
                };
            };

            for call in &resp.tool_calls {
                let result = executor.execute(call).await;
                new_messages.push(TurnMessage {
                    role: "tool".to_string(),
                    content: result.output.clone(),
                    tool_call_id: Some(result.call_id.clone()),
                });
                messages.push(Message {
                    role: Role::User,
                    content: format!("[tool result for {}]: {}", call.name, result.output),
                });
            }
        }

        warn!(rounds = MAX_TOOL_ROUNDS, "tool round budget exhausted, returning what the turn produced so far");
        TurnOutcome {
            replies,
            usage,
            model: last_model,
            provider: self.provider.name().to_string(),
            status: TurnStatus::Ok,
            new_messages,
        }
    }
}

fn role_for(role: &str) -> Role {
    match role {
        "assistant" => Role::Assistant,
        "system" => Role::System,
        _ => Role::User,
    }
}
