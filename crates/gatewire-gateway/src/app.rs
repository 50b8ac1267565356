use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use dashmap::DashMap;
use gatewire_channels::ChannelRegistry;
use gatewire_core::config::GatewayConfig;
use gatewire_orchestrator::ReplyOrchestrator;
use gatewire_pairing::PairingStore;
use gatewire_sessions::{SessionStore, TranscriptStore};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ws::broadcast::EventBroadcaster;

/// Central shared state — passed as `Arc<AppState>` to every Axum handler.
pub struct AppState {
    pub config: GatewayConfig,
    pub agent_id: String,
    pub sessions: Arc<SessionStore>,
    pub transcripts: Arc<TranscriptStore>,
    pub channels: Arc<ChannelRegistry>,
    pub pairing: Arc<PairingStore>,
    pub orchestrator: Arc<ReplyOrchestrator>,
    pub broadcaster: EventBroadcaster,
    pub event_seq: AtomicU64,
    /// Active WS connections, keyed by conn id — presence only, no payload.
    pub ws_clients: DashMap<String, ()>,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        agent_id: String,
        sessions: Arc<SessionStore>,
        transcripts: Arc<TranscriptStore>,
        channels: Arc<ChannelRegistry>,
        pairing: Arc<PairingStore>,
        orchestrator: Arc<ReplyOrchestrator>,
    ) -> Self {
        Self {
            config,
            agent_id,
            sessions,
            transcripts,
            channels,
            pairing,
            orchestrator,
            broadcaster: EventBroadcaster::new(),
            event_seq: AtomicU64::new(0),
            ws_clients: DashMap::new(),
        }
    }

    /// Monotonically increasing sequence for broadcast events.
    pub fn next_seq(&self) -> u64 {
        self.event_seq.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Assemble the full Axum router: a liveness probe and the RPC websocket.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/ws", get(crate::ws::connection::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
