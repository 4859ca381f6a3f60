//! HTTP surface of the relay
//!
//! - `GET /ws/ssh?ip=<host>` upgrades to a WebSocket and relays it to a
//!   shell on `<host>`.
//! - `GET /health` reports liveness.

use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use sg_core::config::Config;
use sg_core::TargetHost;

use crate::channel::ClientChannel;
use crate::remote::{RemoteShell, ServiceAccount};
use crate::session::{open_session, RelaySettings, SessionEnd};
use crate::transport::WebSocketChannel;

/// Shared, read-only state of the HTTP service
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    shell: Arc<dyn RemoteShell>,
    account: ServiceAccount,
    settings: RelaySettings,
    default_port: u16,
}

impl AppState {
    /// Build the state from the service configuration and a shell backend
    pub fn new(config: &Config, shell: Arc<dyn RemoteShell>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                shell,
                account: ServiceAccount {
                    username: config.ssh.username.clone(),
                    credential: config.ssh.credential.clone(),
                },
                settings: RelaySettings::from_config(config),
                default_port: config.ssh.port,
            }),
        }
    }

    /// Open a session for an accepted client and run it to completion.
    ///
    /// Returns `None` when the session never started.
    pub async fn relay(
        &self,
        client: Arc<dyn ClientChannel>,
        target: TargetHost,
    ) -> Option<SessionEnd> {
        let inner = &self.inner;
        match open_session(
            client,
            target,
            &inner.account,
            inner.shell.as_ref(),
            &inner.settings,
        )
        .await
        {
            Ok(session) => Some(session.run().await),
            Err(e) => {
                tracing::debug!("Session not started: {}", e);
                None
            }
        }
    }
}

/// Build the axum router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws/ssh", get(ws_ssh))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve `router` on `listener` until `cancel` fires
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

#[derive(Debug, Deserialize)]
struct ShellQuery {
    /// Target host, `host` or `host:port`
    ip: String,
}

async fn ws_ssh(
    State(state): State<AppState>,
    Query(query): Query<ShellQuery>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let target = match TargetHost::parse(&query.ip, state.inner.default_port) {
        Ok(target) => target,
        Err(e) => {
            tracing::warn!("Rejecting shell request: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let Some(ws) = ws else {
        return (StatusCode::UPGRADE_REQUIRED, "WebSocket upgrade required").into_response();
    };

    tracing::info!("WebSocket accepted for {}", target);
    ws.on_upgrade(move |socket: WebSocket| async move {
        let client: Arc<dyn ClientChannel> = Arc::new(WebSocketChannel::new(socket));
        state.relay(client, target).await;
    })
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
