//! HTTP + WebSocket chat gateway.
//!
//! Serves:
//! - `GET /`                 : chat page from the static directory
//! - `POST /api/chat`        : run one agent turn
//! - `GET /api/history`      : the conversation transcript
//! - `GET /api/tools`        : tool metadata
//! - `GET /api/status`       : `{ "status": "ok", … }`
//! - `GET /visualizations/*` : rendered charts
//! - `GET /ws`               : WebSocket: broadcasts agent activity events

mod handlers;
pub mod transcript;
mod ws;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::agent::Agent;
use crate::config::Config;
use crate::tools::ToolMeta;
use transcript::TranscriptEntry;

/// Handle returned by [`start_gateway`].
pub struct Gateway {
    /// Send events that will be forwarded to all WebSocket clients.
    pub events_tx: broadcast::Sender<String>,
    /// Server task handle.
    pub handle: JoinHandle<()>,
    /// The address the server is actually listening on.
    pub addr: SocketAddr,
}

/// Filesystem locations the gateway serves from.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub static_dir: PathBuf,
    pub visualizations_dir: PathBuf,
}

impl GatewayOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            static_dir: cfg.gateway.static_dir.clone(),
            visualizations_dir: cfg.visualizations_dir.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state injected into axum handlers
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub(crate) struct AppState {
    /// One turn at a time.
    pub(crate) agent: Arc<Mutex<Agent>>,
    pub(crate) transcript: Arc<RwLock<Vec<TranscriptEntry>>>,
    pub(crate) events_tx: broadcast::Sender<String>,
    pub(crate) tools: Arc<Vec<ToolMeta>>,
    pub(crate) visualizations_dir: PathBuf,
    pub(crate) started: Instant,
}

// ---------------------------------------------------------------------------
// Server startup
// ---------------------------------------------------------------------------

/// Start the gateway on `addr`, taking ownership of `agent`.
///
/// The agent's tool activity is wired to the gateway's event stream.
pub async fn start_gateway(
    addr: SocketAddr,
    agent: Agent,
    options: GatewayOptions,
) -> std::io::Result<Gateway> {
    let (events_tx, _) = broadcast::channel::<String>(256);

    let tools = Arc::new(agent.tools().list_tools());
    let agent = agent.with_events(events_tx.clone());

    let state = AppState {
        agent: Arc::new(Mutex::new(agent)),
        transcript: Arc::new(RwLock::new(Vec::new())),
        events_tx: events_tx.clone(),
        tools,
        visualizations_dir: options.visualizations_dir.clone(),
        started: Instant::now(),
    };

    let api_router = Router::new()
        .route("/status", get(handlers::health::status_handler))
        .route("/chat", post(handlers::chat::api_chat))
        .route("/history", get(handlers::chat::api_history))
        .route("/tools", get(handlers::chat::api_tools));

    let app = Router::new()
        .nest("/api", api_router)
        .route("/ws", get(ws::ws_handler))
        .nest_service("/visualizations", ServeDir::new(&options.visualizations_dir))
        .with_state(state)
        .fallback_service(ServeDir::new(&options.static_dir));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("gateway server error: {e}");
        }
    });

    info!(%bound_addr, static_dir = %options.static_dir.display(), "gateway started");

    Ok(Gateway {
        events_tx,
        handle,
        addr: bound_addr,
    })
}
