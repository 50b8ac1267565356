use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use gatewire_agent::AgentTurnInvoker;
use gatewire_channels::ChannelRegistry;
use gatewire_core::config::GatewayConfig;
use gatewire_orchestrator::{
    send_message_tool_definition, MessagingToolExecutor, OrchestratorConfig, ReplyOrchestrator,
};
use gatewire_pairing::PairingStore;
use gatewire_sessions::{SessionStore, TranscriptStore};
use tracing::info;

mod app;
mod http;
mod provider_http;
mod stop;
mod ws;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatewire_gateway=info,tower_http=debug".into()),
        )
        .init();

    // load config: explicit path > GATEWAY_CONFIG env > <state-dir>/gateway.toml
    let config_path = std::env::var("GATEWAY_CONFIG").ok();
    let config = GatewayConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({e}), using defaults");
        GatewayConfig::default()
    });

    let state_dir = PathBuf::from(config.state_dir());
    let sessions = Arc::new(SessionStore::open(state_dir.join("sessions.json"))?);
    let transcripts = Arc::new(TranscriptStore::new(state_dir.join("transcripts")));
    let pairing = Arc::new(PairingStore::open(state_dir.join("pairing.json"))?);
    let channels = Arc::new(ChannelRegistry::new());

    let provider =
        provider_http::HttpChatProvider::from_env("default", "GATEWAY_PROVIDER_URL", "GATEWAY_PROVIDER_API_KEY");
    let messaging_tool = MessagingToolExecutor { channels: channels.clone(), retry: config.retry.clone() };
    let invoker = Arc::new(
        AgentTurnInvoker::new(Box::new(provider))
            .with_tools(vec![send_message_tool_definition()], Arc::new(messaging_tool)),
    );

    let agent_id = "main".to_string();
    let orchestrator = ReplyOrchestrator::new(OrchestratorConfig {
        agent_id: agent_id.clone(),
        sessions: sessions.clone(),
        transcripts: transcripts.clone(),
        channels: channels.clone(),
        invoker,
        retry: config.retry.clone(),
        sandbox_root: state_dir.join("sandbox"),
        debounce_ms: config.queue.debounce_ms,
        queue_max: config.queue.max,
        drop_policy: config.queue.drop_policy.clone(),
        allowed_models: config.allowed_models.clone(),
    });

    let bind = config.bind.clone();
    let port = config.port;
    let state = Arc::new(app::AppState::new(
        config,
        agent_id,
        sessions,
        transcripts,
        channels,
        pairing,
        orchestrator,
    ));
    let router = app::build_router(state.clone());

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

async fn shutdown_signal(state: Arc<app::AppState>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
    let report = stop::execute_stop(&state).await;
    info!("{report}");
}
