//! Event hub and the console WebSocket feed

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{RealtimeEvent, SubscriptionFilter};

/// Events buffered per subscriber before it starts lagging
const CHANNEL_CAPACITY: usize = 1000;

/// Broadcast hub shared by every desk service
#[derive(Clone)]
pub struct RealtimeManager {
    tx: broadcast::Sender<RealtimeEvent>,
    consoles: Arc<AtomicUsize>,
}

impl RealtimeManager {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            consoles: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publish an event; dropped silently when nobody listens
    pub fn broadcast(&self, event: RealtimeEvent) {
        tracing::debug!("event {:?} tenant={}", event.event_type, event.tenant_id);
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.tx.subscribe()
    }

    /// Consoles currently attached over WebSocket
    pub fn console_count(&self) -> usize {
        self.consoles.load(Ordering::Relaxed)
    }

    fn attach(&self) -> ConsoleGuard {
        self.consoles.fetch_add(1, Ordering::Relaxed);
        ConsoleGuard(self.consoles.clone())
    }
}

impl Default for RealtimeManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the console count when a connection ends
struct ConsoleGuard(Arc<AtomicUsize>);

impl Drop for ConsoleGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Initial filter from the upgrade URL (`/ws?tenant_id=acme`)
#[derive(Debug, Default, Deserialize)]
struct ConnectParams {
    tenant_id: Option<String>,
    session_id: Option<String>,
}

pub struct RealtimeServer {
    manager: RealtimeManager,
    addr: SocketAddr,
}

impl RealtimeServer {
    pub fn new(manager: RealtimeManager, port: u16) -> Self {
        Self {
            manager,
            addr: SocketAddr::from(([0, 0, 0, 0], port)),
        }
    }

    pub fn router(manager: RealtimeManager) -> Router {
        Router::new()
            .route("/ws", get(upgrade))
            .route("/health", get(health))
            .with_state(manager)
    }

    pub async fn start(self) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("Console feed listening on {}", self.addr);
        axum::serve(listener, Self::router(self.manager)).await
    }
}

async fn health(State(manager): State<RealtimeManager>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "consoles": manager.console_count() }))
}

async fn upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(manager): State<RealtimeManager>,
) -> impl IntoResponse {
    let filter = SubscriptionFilter {
        event_types: None,
        tenant_id: params.tenant_id,
        session_id: params.session_id,
    };
    ws.on_upgrade(move |socket| run_console(socket, manager, filter))
}

/// Forward matching events to one console; a text frame holding a
/// `SubscriptionFilter` replaces the connection's filter
async fn run_console(socket: WebSocket, manager: RealtimeManager, filter: SubscriptionFilter) {
    let id = Uuid::new_v4();
    let _guard = manager.attach();
    let filter = Arc::new(RwLock::new(filter));
    tracing::info!("Console {} connected", id);

    let (mut sink, mut stream) = socket.split();
    let mut rx = manager.subscribe();

    let forward_filter = filter.clone();
    let mut forward = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Console {} lagged, skipped {} events", id, skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if !forward_filter.read().matches(&event) {
                continue;
            }
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut listen = tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<SubscriptionFilter>(&text) {
                    Ok(next) => *filter.write() = next,
                    Err(e) => tracing::debug!("Ignoring console {} message: {}", id, e),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut forward => listen.abort(),
        _ = &mut listen => forward.abort(),
    }
    tracing::info!("Console {} disconnected", id);
}
