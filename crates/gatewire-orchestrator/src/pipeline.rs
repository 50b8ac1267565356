use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use dashmap::DashMap;
use gatewire_agent::{AgentTurnInvoker, IdMode, ThinkingLevel as AgentThinkingLevel, TurnMessage, TurnRequest, TurnStatus};
use gatewire_channels::{CanonicalTarget, ChannelRegistry, ChatType, MsgContext, ReplyPayload};
use gatewire_core::config::{DropPolicy, RetryConfig};
use gatewire_core::now_ms;
use gatewire_queue::{Batch, QueueHandler, QueueManager, QueuedMessage};
use gatewire_sessions::{
    GroupActivation, OnOff, SendPolicy, SessionEntry, SessionKey, SessionKeyKind, SessionStore,
    ThinkingLevel as SessionThinkingLevel, TranscriptMessage, TranscriptStore,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::ack::{ack_payload, fast_path_for, FastPath};
use crate::directive_patch;
use crate::envelope::normalize;
use crate::media::stage_media;
use crate::reply_tag::extract_reply_to;

/// Wiring needed to construct a [`ReplyOrchestrator`], kept separate from
/// the struct itself so callers don't have to name every field twice.
pub struct OrchestratorConfig {
    pub agent_id: String,
    pub sessions: Arc<SessionStore>,
    pub transcripts: Arc<TranscriptStore>,
    pub channels: Arc<ChannelRegistry>,
    pub invoker: Arc<AgentTurnInvoker>,
    pub retry: RetryConfig,
    pub sandbox_root: PathBuf,
    pub debounce_ms: u64,
    pub queue_max: usize,
    pub drop_policy: DropPolicy,
    pub allowed_models: Vec<String>,
}

/// Routes one inbound channel message through directive handling, the
/// per-session queue, an agent turn, and delivery back out. Holds every
/// long-lived store and channel handle as an `Arc` so it can be shared
/// across every connection the gateway is serving.
pub struct ReplyOrchestrator {
    agent_id: String,
    sessions: Arc<SessionStore>,
    transcripts: Arc<TranscriptStore>,
    channels: Arc<ChannelRegistry>,
    invoker: Arc<AgentTurnInvoker>,
    retry: RetryConfig,
    sandbox_root: PathBuf,
    allowed_models: Vec<String>,
    active_turns: DashMap<String, CancellationToken>,
    // Set once, in `new`, right after construction — see `TurnHandler`. The
    // queue's handler holds an `Arc` back to this orchestrator, so the two
    // form an intentional reference cycle that lives for the process.
    queue: OnceLock<Arc<QueueManager>>,
}

struct TurnHandler {
    orchestrator: Arc<ReplyOrchestrator>,
}

#[async_trait]
impl QueueHandler for TurnHandler {
    async fn on_batch(&self, batch: Batch) {
        self.orchestrator.process_batch(batch).await;
    }
}

struct TargetParts {
    channel: String,
    account_id: String,
    remote: String,
}

impl ReplyOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Arc<Self> {
        let this = Arc::new(Self {
            agent_id: config.agent_id,
            sessions: config.sessions,
            transcripts: config.transcripts,
            channels: config.channels,
            invoker: config.invoker,
            retry: config.retry,
            sandbox_root: config.sandbox_root,
            allowed_models: config.allowed_models,
            active_turns: DashMap::new(),
            queue: OnceLock::new(),
        });

        let handler: Arc<dyn QueueHandler> = Arc::new(TurnHandler { orchestrator: Arc::clone(&this) });
        let queue = QueueManager::new(config.debounce_ms, config.queue_max, config.drop_policy, handler);
        this.queue
            .set(queue)
            .unwrap_or_else(|_| unreachable!("queue is only ever set once, here"));
        this
    }

    fn queue(&self) -> &Arc<QueueManager> {
        self.queue.get().expect("queue initialized in new()")
    }

    /// Cancels one session's in-flight turn and drains its queue, the same
    /// effect a `/stop` directive has. Used by the gateway's `chat.abort`
    /// method, which targets a session directly rather than via a message.
    pub fn abort_session(&self, key: &SessionKey) {
        self.queue().abort(key.as_str());
        if let Some((_, token)) = self.active_turns.remove(key.as_str()) {
            token.cancel();
        }
    }

    /// Cancels every in-flight agent turn and drains every session's queue.
    /// Used by the gateway's emergency-stop method; returns the number of
    /// turns that were actually cancelled.
    pub fn abort_all(&self) -> usize {
        let keys: Vec<String> = self.active_turns.iter().map(|e| e.key().clone()).collect();
        for key in &keys {
            if let Some((_, token)) = self.active_turns.remove(key) {
                token.cancel();
            }
            self.queue().abort(key);
        }
        keys.len()
    }

    /// Entry point for every inbound channel message. Never propagates an
    /// error: once a channel plugin hands a message off there's no caller
    /// left to report failure to, so problems are logged and swallowed.
    #[instrument(skip(self, msg), fields(channel = %msg.channel, from = %msg.from))]
    pub async fn handle_inbound(&self, msg: MsgContext) {
        if msg.is_heartbeat {
            return;
        }

        let envelope = normalize(&self.agent_id, &msg);
        let now = now_ms();

        if let Some(path) = fast_path_for(&envelope.directives) {
            self.handle_fast_path(&envelope.session_key, &msg, path).await;
            return;
        }

        let mut acks = Vec::new();
        if !envelope.directives.is_empty() {
            let patched = self.sessions.patch(&envelope.session_key, now, |entry| {
                for directive in &envelope.directives {
                    if let Some(ack) = directive_patch::apply(entry, directive, &self.allowed_models) {
                        acks.push(ack);
                    }
                }
                Ok(())
            });
            if let Err(err) = patched {
                warn!(err = %err, "failed to apply directive patch");
                self.deliver_now(&msg, ReplyPayload::text(format!("⚙️ {err}"))).await;
                return;
            }
        }

        if !acks.is_empty() {
            self.deliver_now(&msg, ReplyPayload::text(format!("⚙️ {}", acks.join(", ")))).await;
        }

        let body = envelope.body_clean.trim();
        if body.is_empty() {
            return;
        }

        let entry = match self.sessions.get_or_create(&envelope.session_key, now) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(err = %err, "failed to load session entry");
                return;
            }
        };

        if matches!(envelope.chat_type, ChatType::Group | ChatType::Channel)
            && !matches!(entry.group_activation, Some(GroupActivation::Always))
        {
            let mentioned = self
                .channels
                .get(&msg.channel)
                .map(|plugin| plugin.has_mention(&msg, &self.agent_id))
                .unwrap_or(false);
            if !mentioned {
                return;
            }
        }

        let staged = if msg.media_path.is_empty() {
            Vec::new()
        } else {
            let session_dir = self.sandbox_root.join(&entry.session_id);
            stage_media(&msg.media_path, &session_dir).unwrap_or_else(|err| {
                warn!(err = %err, "failed to stage media, continuing without it");
                Vec::new()
            })
        };

        let mut full_body = body.to_string();
        if !staged.is_empty() {
            full_body.push_str("\n\n[Attached media]\n");
            for path in &staged {
                full_body.push_str(path);
                full_body.push('\n');
            }
        }

        self.queue().enqueue(
            envelope.session_key.as_str(),
            QueuedMessage { body: full_body, received_at_ms: now },
        );
    }

    async fn handle_fast_path(&self, key: &SessionKey, msg: &MsgContext, path: FastPath) {
        match path {
            FastPath::Abort => {
                self.queue().abort(key.as_str());
                if let Some(token) = self.active_turns.get(key.as_str()) {
                    token.cancel();
                }
            }
            FastPath::NewSession | FastPath::Reset => {
                if let Err(err) = self.sessions.delete(key) {
                    warn!(err = %err, "failed to clear session on new/reset");
                }
            }
            FastPath::Restart | FastPath::Status | FastPath::Help | FastPath::Commands => {}
        }

        let payload = if path == FastPath::Status {
            self.status_payload(key)
        } else {
            ack_payload(path)
        };
        self.deliver_now(msg, payload).await;
    }

    fn status_payload(&self, key: &SessionKey) -> ReplyPayload {
        match self.sessions.get(key) {
            Some(entry) => ReplyPayload::text(format!(
                "⚙️ thinking={:?} verbose={:?} model={} queued={}",
                entry.thinking_level,
                entry.verbose_level,
                entry.model_override.as_deref().unwrap_or("default"),
                self.queue().queue_len(key.as_str()),
            )),
            None => ReplyPayload::text("⚙️ No session yet."),
        }
    }

    async fn deliver_now(&self, msg: &MsgContext, payload: ReplyPayload) {
        let Some(plugin) = self.channels.get(&msg.channel) else {
            warn!(channel = %msg.channel, "no plugin registered, dropping ack");
            return;
        };
        let target = CanonicalTarget(msg.from.clone());
        if let Err(err) = gatewire_delivery::deliver(plugin, &target, &payload, &self.retry).await {
            warn!(err = %err, "failed to deliver ack payload");
        }
    }

    async fn process_batch(&self, batch: Batch) {
        let Ok(key) = SessionKey::parse(&batch.session_key) else {
            warn!(session_key = %batch.session_key, "unparseable session key in batch");
            return;
        };

        let now = now_ms();
        let entry = match self.sessions.get_or_create(&key, now) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(err = %err, "failed to load session for batch");
                return;
            }
        };

        let cancel = CancellationToken::new();
        self.active_turns.insert(key.as_str().to_string(), cancel.clone());

        let history: Vec<TurnMessage> = self
            .transcripts
            .read_all(&entry.session_id)
            .unwrap_or_default()
            .into_iter()
            .map(|m| TurnMessage { role: m.role, content: m.content, tool_call_id: None })
            .collect();

        let mut batch_text = String::new();
        for (i, message) in batch.messages.iter().enumerate() {
            if i > 0 {
                batch_text.push('\n');
            }
            batch_text.push_str(&message.body);
        }
        if let Some(note) = &batch.overflow_note {
            if !batch_text.is_empty() {
                batch_text.push_str("\n\n");
            }
            batch_text.push_str(note);
        }

        let request = TurnRequest {
            history,
            batch_text,
            system_prompt: build_system_prompt(&entry),
            model: entry.model_override.clone().unwrap_or_else(|| "default".to_string()),
            thinking: entry.thinking_level.and_then(convert_thinking),
            id_mode: IdMode::Standard,
            external_source: None,
        };

        let outcome = self.invoker.run_turn(request, cancel).await;
        self.active_turns.remove(key.as_str());

        let turn_now = now_ms();
        for message in &outcome.new_messages {
            if let Err(err) = self.transcripts.append(
                &entry.session_id,
                &TranscriptMessage { role: message.role.clone(), content: message.content.clone(), at_ms: turn_now },
            ) {
                warn!(err = %err, "failed to append transcript message");
            }
        }

        if outcome.status != TurnStatus::Ok || outcome.replies.is_empty() {
            return;
        }
        if matches!(entry.send_policy, Some(SendPolicy::Deny)) {
            info!(session_key = %key, "send policy denies delivery for this session");
            return;
        }

        let Some(parts) = target_parts(&key) else {
            warn!(session_key = %key, "session key has no channel target, cannot deliver");
            return;
        };
        let Some(plugin) = self.channels.get(&parts.channel) else {
            warn!(channel = %parts.channel, "no plugin registered for delivery");
            return;
        };

        let mut sent_targets = gatewire_delivery::SentTargetTracker::new();
        for message in &outcome.new_messages {
            if let Some((channel, account_id, canonical_id)) = crate::tools::parse_sent_target(&message.content) {
                sent_targets.mark_sent(&channel, &account_id, &canonical_id);
            }
        }
        if sent_targets.already_sent(&parts.channel, &parts.account_id, &parts.remote) {
            info!(session_key = %key, "final reply target already reached via an in-turn messaging tool, suppressing");
            return;
        }

        let target = CanonicalTarget(parts.remote.clone());
        let mut delivered_any = false;
        for (i, reply) in outcome.replies.iter().enumerate() {
            let (clean_text, reply_to_id) = extract_reply_to(&reply.text);
            if clean_text.trim().is_empty() {
                continue;
            }
            let payload = ReplyPayload {
                text: Some(clean_text),
                reply_to_id: if i == 0 { reply_to_id } else { None },
                ..Default::default()
            };
            match gatewire_delivery::deliver(plugin, &target, &payload, &self.retry).await {
                Ok(_) => delivered_any = true,
                Err(err) => warn!(err = %err, "delivery failed after retries"),
            }
        }

        if delivered_any {
            let provider = outcome.provider.clone();
            let patched = self.sessions.patch(&key, turn_now, |e| {
                e.last_provider = Some(provider.clone());
                e.last_to = Some(parts.remote.clone());
                e.last_account_id = Some(parts.account_id.clone());
                e.last_channel = Some(parts.channel.clone());
                Ok(())
            });
            if let Err(err) = patched {
                warn!(err = %err, "failed to record last-delivery metadata");
            }
        }
    }
}

fn target_parts(key: &SessionKey) -> Option<TargetParts> {
    match key.kind()? {
        SessionKeyKind::Direct { channel, account_id, remote, .. } => {
            Some(TargetParts { channel, account_id, remote })
        }
        SessionKeyKind::Group { channel, account_id, group_id, .. } => {
            Some(TargetParts { channel, account_id, remote: group_id })
        }
        SessionKeyKind::Main { .. } | SessionKeyKind::Subagent { .. } => None,
    }
}

fn convert_thinking(level: SessionThinkingLevel) -> Option<AgentThinkingLevel> {
    Some(match level {
        SessionThinkingLevel::Minimal => AgentThinkingLevel::Minimal,
        SessionThinkingLevel::Low => AgentThinkingLevel::Low,
        SessionThinkingLevel::Medium => AgentThinkingLevel::Medium,
        SessionThinkingLevel::High => AgentThinkingLevel::High,
    })
}

fn build_system_prompt(entry: &SessionEntry) -> String {
    let mut prompt = String::from("You are a helpful assistant reachable over chat.");
    if matches!(entry.elevated_level, Some(OnOff::On)) {
        prompt.push_str(" Elevated mode is enabled for this session.");
    }
    if matches!(entry.verbose_level, Some(OnOff::On)) {
        prompt.push_str(" Prefer verbose, detailed responses.");
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait as tokio_async_trait;
    use gatewire_agent::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
    use gatewire_channels::{Capability, ChannelError, ChannelStatus, SendOpts, SendResult};
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct Echo;

    #[tokio_async_trait]
    impl LlmProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: format!("echo: {}", req.messages.last().unwrap().content),
                model: req.model.clone(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "end_turn".to_string(),
                tool_calls: Vec::new(),
            })
        }
    }

    struct RecordingPlugin {
        sent: Mutex<Vec<String>>,
    }

    #[tokio_async_trait]
    impl gatewire_channels::ChannelPlugin for RecordingPlugin {
        fn id(&self) -> &str {
            "testchan"
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
            payload: &ReplyPayload,
            _opts: &SendOpts,
        ) -> Result<SendResult, ChannelError> {
            self.sent.lock().unwrap().push(payload.text.clone().unwrap_or_default());
            Ok(SendResult { message_id: "1".to_string(), channel_id: "testchan".to_string() })
        }
        fn status(&self) -> ChannelStatus {
            ChannelStatus::Connected
        }
    }

    fn msg(body: &str, chat_type: ChatType) -> MsgContext {
        MsgContext {
            body: body.to_string(),
            from: "user1".to_string(),
            to: "user1".to_string(),
            channel: "testchan".to_string(),
            account_id: "acct".to_string(),
            chat_type,
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

    fn build_orchestrator(dir: &std::path::Path) -> Arc<ReplyOrchestrator> {
        let mut registry = ChannelRegistry::new();
        registry.register_built_in(Box::new(RecordingPlugin { sent: Mutex::new(Vec::new()) }));

        ReplyOrchestrator::new(OrchestratorConfig {
            agent_id: "support".to_string(),
            sessions: Arc::new(SessionStore::open(dir.join("sessions.json")).unwrap()),
            transcripts: Arc::new(TranscriptStore::new(dir.join("transcripts"))),
            channels: Arc::new(registry),
            invoker: Arc::new(AgentTurnInvoker::new(Box::new(Echo))),
            retry: RetryConfig { max_attempts: 1, base_delay_ms: 1, max_delay_ms: 1 },
            sandbox_root: dir.join("sandbox"),
            debounce_ms: 20,
            queue_max: 20,
            drop_policy: DropPolicy::Summarize,
            allowed_models: vec!["default".to_string()],
        })
    }

    #[tokio::test]
    async fn directive_only_message_acks_without_queuing_a_turn() {
        let dir = tempdir().unwrap();
        let orchestrator = build_orchestrator(dir.path());
        orchestrator.handle_inbound(msg("/verbose on", ChatType::Direct)).await;

        let key = SessionKey::direct("support", "testchan", "acct", "user1");
        let entry = orchestrator.sessions.get(&key).unwrap();
        assert_eq!(entry.verbose_level, Some(OnOff::On));
    }

    #[tokio::test]
    async fn stop_cancels_without_leaving_a_pending_turn() {
        let dir = tempdir().unwrap();
        let orchestrator = build_orchestrator(dir.path());
        orchestrator.handle_inbound(msg("hello", ChatType::Direct)).await;
        orchestrator.handle_inbound(msg("stop", ChatType::Direct)).await;

        let key = SessionKey::direct("support", "testchan", "acct", "user1");
        assert_eq!(orchestrator.queue().queue_len(key.as_str()), 0);
    }

    #[tokio::test]
    async fn full_turn_delivers_reply_and_records_last_delivery() {
        let dir = tempdir().unwrap();
        let orchestrator = build_orchestrator(dir.path());
        orchestrator.handle_inbound(msg("are you there", ChatType::Direct)).await;

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let key = SessionKey::direct("support", "testchan", "acct", "user1");
        let entry = orchestrator.sessions.get(&key).unwrap();
        assert_eq!(entry.last_channel.as_deref(), Some("testchan"));
    }
}
