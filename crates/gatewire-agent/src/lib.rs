//! Agent turn invocation: runs a batched prompt against an LLM provider
//! (with model fallback), pruning and sanitizing the transcript first.

pub mod provider;
pub mod router;
pub mod runtime;
pub mod sanitize;
pub mod stream;
pub mod thinking;
pub mod transcript;

pub use provider::{
    ChatRequest, ChatResponse, LlmProvider, Message, ProviderError, Role, ToolCall, ToolDefinition,
};
pub use router::{ProviderRouter, ProviderSlot};
pub use runtime::{
    AgentTurnInvoker, ToolExecutor, ToolResult, TurnOutcome, TurnReply, TurnRequest, TurnStatus,
    Usage,
};
pub use sanitize::{sanitize_tool_call_ids, IdMode};
pub use thinking::ThinkingLevel;
pub use transcript::TurnMessage;
