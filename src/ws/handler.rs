//! WebSocket endpoint the remote renderer dials into

use std::sync::Arc;

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Hands the first matching peer socket to the waiting transport
#[derive(Clone)]
pub struct PeerEndpoint {
    peer_id: Arc<str>,
    slot: Arc<Mutex<Option<oneshot::Sender<WebSocket>>>>,
}

impl PeerEndpoint {
    /// Endpoint for `peer_id`; the accepted socket is delivered on the returned receiver
    pub fn new(peer_id: &str) -> (Self, oneshot::Receiver<WebSocket>) {
        let (tx, rx) = oneshot::channel();
        let endpoint = Self {
            peer_id: Arc::from(peer_id),
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (endpoint, rx)
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Claim the single session slot, if still free
    fn claim(&self) -> Option<oneshot::Sender<WebSocket>> {
        self.slot.lock().take()
    }
}

/// Build the peer router
pub fn build_router(endpoint: PeerEndpoint) -> Router {
    Router::new()
        .route("/ws/:peer_id", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(endpoint)
}

/// WebSocket upgrade handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(peer_id): Path<String>,
    State(endpoint): State<PeerEndpoint>,
) -> Response {
    if peer_id != endpoint.peer_id() {
        warn!(requested = %peer_id, "Peer connection for unknown id");
        return (StatusCode::NOT_FOUND, "Unknown peer id").into_response();
    }

    let Some(slot) = endpoint.claim() else {
        warn!(peer_id = %peer_id, "Session already has a peer");
        return (StatusCode::CONFLICT, "Session already has a peer").into_response();
    };

    info!(peer_id = %peer_id, "Remote peer connecting");
    ws.on_upgrade(move |socket| async move {
        if slot.send(socket).is_err() {
            warn!("Transport stopped waiting before the peer connected");
        }
    })
}
