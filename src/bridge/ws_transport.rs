//! Remote renderer transport over WebSocket

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ws::handler::{build_router, PeerEndpoint};
use crate::ws::protocol::{BridgeMsg, PeerMsg};

use super::error::TransportError;
use super::transport::PeerTransport;

/// Serves `/ws/{peer_id}` and talks JSON text frames with the one peer that connects
pub struct WsTransport {
    addr: SocketAddr,
    peer_id: String,
    socket: Option<WebSocket>,
    server: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl WsTransport {
    pub fn new(addr: SocketAddr, peer_id: impl Into<String>) -> Self {
        Self {
            addr,
            peer_id: peer_id.into(),
            socket: None,
            server: None,
            shutdown: None,
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    fn stop_server(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server.take() {
            handle.abort();
        }
    }
}

/// Decode one inbound WebSocket message.
/// `Ok(None)` means the frame carries no protocol payload.
fn decode(message: Message) -> Result<Option<PeerMsg>, TransportError> {
    match message {
        Message::Text(text) => serde_json::from_str::<PeerMsg>(&text)
            .map(Some)
            .map_err(|e| TransportError::Protocol(format!("{e}: {text}"))),
        Message::Binary(_) => Err(TransportError::Protocol(
            "binary frames are not part of the protocol".to_string(),
        )),
        Message::Ping(_) | Message::Pong(_) => Ok(None),
        Message::Close(_) => Err(TransportError::Closed),
    }
}

#[async_trait]
impl PeerTransport for WsTransport {
    fn name(&self) -> &'static str {
        "websocket"
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        let (endpoint, socket_rx) = PeerEndpoint::new(&self.peer_id);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let router = build_router(endpoint);

        self.server = Some(tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "Peer endpoint stopped");
            }
        }));
        self.shutdown = Some(shutdown_tx);

        info!(
            "Waiting for remote peer on ws://{}/ws/{}",
            local_addr, self.peer_id
        );

        let socket = socket_rx.await.map_err(|_| TransportError::Closed)?;
        self.socket = Some(socket);
        info!(peer_id = %self.peer_id, "Remote peer connected");
        Ok(())
    }

    async fn send(&mut self, msg: BridgeMsg) -> Result<(), TransportError> {
        let socket = self.socket.as_mut().ok_or(TransportError::Closed)?;
        let json = serde_json::to_string(&msg)?;
        socket
            .send(Message::Text(json))
            .await
            .map_err(|e| TransportError::Other(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Option<PeerMsg>, TransportError> {
        let socket = self.socket.as_mut().ok_or(TransportError::Closed)?;
        loop {
            match socket.next().await {
                Some(Ok(message)) => match decode(message) {
                    Ok(Some(msg)) => return Ok(Some(msg)),
                    Ok(None) => continue,
                    Err(TransportError::Closed) => {
                        info!("Remote peer closed the connection");
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                },
                Some(Err(e)) => return Err(TransportError::Other(e.to_string())),
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.send(Message::Close(None)).await {
                debug!(error = %e, "Close frame not delivered");
            }
        }
        self.stop_server();
        Ok(())
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.stop_server();
    }
}
