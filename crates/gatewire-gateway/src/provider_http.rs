//! Concrete [`LlmProvider`] backed by an OpenAI-compatible chat-completions
//! endpoint. Configured entirely from environment variables so an API key
//! never has to land in `gateway.toml`.

use async_trait::async_trait;
use gatewire_agent::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
use serde::{Deserialize, Serialize};

const DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct HttpChatProvider {
    name: String,
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpChatProvider {
    pub fn new(name: impl Into<String>, url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Reads the endpoint and key from the given env var names, falling
    /// back to [`DEFAULT_URL`] when the url var is unset.
    pub fn from_env(name: &str, url_env: &str, key_env: &str) -> Self {
        let url = std::env::var(url_env).unwrap_or_else(|_| DEFAULT_URL.to_string());
        let api_key = std::env::var(key_env).ok();
        Self::new(name, url, api_key)
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireReplyMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireReplyMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[async_trait]
impl LlmProvider for HttpChatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut messages = Vec::with_capacity(req.messages.len() + 1);
        if !req.system.is_empty() {
            messages.push(WireMessage { role: "system", content: req.system.clone() });
        }
        for m in &req.messages {
            let role = match m.role {
                gatewire_agent::Role::User => "user",
                gatewire_agent::Role::Assistant => "assistant",
                gatewire_agent::Role::System => "system",
            };
            messages.push(WireMessage { role, content: m.content.clone() });
        }

        let body = WireRequest { model: &req.model, messages, max_tokens: req.max_tokens };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(5_000);
            return Err(ProviderError::RateLimited { retry_after_ms });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status: status.as_u16(), message });
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("response had no choices".to_string()))?;

        Ok(ChatResponse {
            content: choice.message.content,
            model: parsed.model.unwrap_or_else(|| req.model.clone()),
            tokens_in: parsed.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
            tokens_out: parsed.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0),
            stop_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            tool_calls: Vec::new(),
        })
    }
}
