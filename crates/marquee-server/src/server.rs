//! Watch server: rebuilds on source changes and serves live reload.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use marquee_static::{Pipeline, Task};
use tower_http::services::ServeDir;

use crate::livereload::{livereload_client_script, LiveReloadHub, LiveReloadMessage};
use crate::watcher::{task_for_change, FileWatcher, WatchEvent};

/// Configuration for the watch server.
#[derive(Debug, Clone)]
pub struct WatchServerConfig {
    /// Directory containing site sources
    pub source_dir: PathBuf,

    /// Directory the build writes to
    pub output_dir: PathBuf,

    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Open browser on start
    pub open: bool,
}

impl Default for WatchServerConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("src"),
            output_dir: PathBuf::from("target"),
            host: "127.0.0.1".to_string(),
            port: 35729,
            open: false,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),
}

/// Shared server state.
struct ServerState {
    hub: LiveReloadHub,
    ws_url: String,
}

/// Watch server.
pub struct WatchServer {
    config: WatchServerConfig,
}

impl WatchServer {
    pub fn new(config: WatchServerConfig) -> Self {
        Self { config }
    }

    /// Watch sources, rebuild through `pipeline`, and serve live reload until stopped.
    pub async fn start(self, pipeline: Arc<Pipeline>) -> Result<(), ServerError> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|_| {
                ServerError::InvalidAddress(format!("{}:{}", self.config.host, self.config.port))
            })?;

        std::fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| ServerError::WatchError(e.to_string()))?;
        // notify reports absolute paths
        let source_dir = std::fs::canonicalize(&self.config.source_dir)
            .map_err(|e| ServerError::WatchError(format!("{}: {}", self.config.source_dir.display(), e)))?;
        let output_dir = std::fs::canonicalize(&self.config.output_dir)
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let hub = LiveReloadHub::new();

        let (source_watcher, mut source_rx) = FileWatcher::new(&[source_dir.clone()])
            .map_err(|e| ServerError::WatchError(e.to_string()))?;
        tokio::spawn(async move {
            while let Some(event) = source_rx.recv().await {
                let Some(task) = task_for_change(&source_dir, event.path()) else {
                    continue;
                };
                tracing::info!("{} changed", event.path().display());
                if !rebuild(pipeline.clone(), task).await {
                    tracing::warn!("Still watching after '{}' failed", task);
                }
            }
            drop(source_watcher);
        });

        let (output_watcher, mut output_rx) = FileWatcher::new(&[output_dir.clone()])
            .map_err(|e| ServerError::WatchError(e.to_string()))?;
        let reload_hub = hub.clone();
        let served_dir = output_dir.clone();
        tokio::spawn(async move {
            while let Some(event) = output_rx.recv().await {
                if matches!(event, WatchEvent::Deleted(_)) {
                    continue;
                }
                let path = output_relative(&served_dir, event.path());
                tracing::debug!("Reloading {} browsers for {}", reload_hub.subscriber_count(), path);
                reload_hub.send(LiveReloadMessage::changed(path));
            }
            drop(output_watcher);
        });

        let state = Arc::new(ServerState {
            hub,
            ws_url: format!("ws://{}/livereload", addr),
        });

        let app = Router::new()
            .route("/livereload", get(ws_handler))
            .route("/livereload.js", get(script_handler))
            .fallback_service(ServeDir::new(&output_dir))
            .with_state(state);

        tracing::info!("Watching {} and serving http://{}", self.config.source_dir.display(), addr);

        if self.config.open {
            let _ = open::that(format!("http://{}", addr));
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

/// Run `task` on the blocking pool so file IO and page rendering stay off the
/// async workers. Returns whether the task succeeded.
async fn rebuild(pipeline: Arc<Pipeline>, task: Task) -> bool {
    let runtime = tokio::runtime::Handle::current();
    let result = tokio::task::spawn_blocking(move || runtime.block_on(pipeline.run(task))).await;

    match result {
        Ok(outcome) => outcome.is_ok(),
        Err(e) => {
            tracing::error!("'{}' panicked: {}", task, e);
            false
        }
    }
}

/// Path of an output file relative to the served directory, with `/` separators.
fn output_relative(output_dir: &Path, path: &Path) -> String {
    path.strip_prefix(output_dir)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Handler for the live reload WebSocket endpoint.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Forward reload messages to one browser.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();

    if send_json(&mut socket, &LiveReloadMessage::Hello).await.is_err() {
        return;
    }

    while let Ok(msg) = rx.recv().await {
        if send_json(&mut socket, &msg).await.is_err() {
            break;
        }
    }
}

async fn send_json(socket: &mut WebSocket, msg: &LiveReloadMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

/// Handler for the live reload client script.
async fn script_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let script = livereload_client_script(&state.ws_url);
    ([("content-type", "application/javascript")], script)
}
