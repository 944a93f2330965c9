//! Background worker: one thread, one cooperative event loop, owns the peer connection

use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ws::protocol::{BridgeMsg, GameState, PeerMsg};

use super::error::TransportError;
use super::transport::PeerTransport;

/// Caller → worker
#[derive(Debug)]
pub(crate) enum Command {
    /// Forward a frame to the peer
    Send(BridgeMsg),
    /// Tell the peer we are leaving and stop
    Shutdown,
}

/// Worker → caller
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    /// Peer announced `connection_ready`
    Ready,
    ResetResult(GameState),
    ActionResult(GameState),
    /// Peer went away or the transport failed
    ConnectionLost(String),
    /// Peer sent something outside the protocol
    ProtocolError(String),
    /// Sentinel pushed by `close()` to release a parked caller
    Closed,
}

impl WorkerEvent {
    fn from_transport_error(err: TransportError) -> Self {
        match err {
            TransportError::Protocol(msg) => WorkerEvent::ProtocolError(msg),
            TransportError::Serialization(e) => WorkerEvent::ProtocolError(e.to_string()),
            other => WorkerEvent::ConnectionLost(other.to_string()),
        }
    }
}

/// Start the worker thread
pub(crate) fn spawn(
    session: Uuid,
    transport: Box<dyn PeerTransport>,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<WorkerEvent>,
) -> std::io::Result<JoinHandle<()>> {
    let short_id = session.simple().to_string();
    thread::Builder::new()
        .name(format!("bridge-worker-{}", &short_id[..8]))
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!(session = %session, error = %e, "Failed to build worker runtime");
                    let _ = events.try_send(WorkerEvent::ConnectionLost(e.to_string()));
                    return;
                }
            };

            let worker = Worker {
                session,
                transport,
                commands,
                events,
            };
            runtime.block_on(worker.run());
        })
}

struct Worker {
    session: Uuid,
    transport: Box<dyn PeerTransport>,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<WorkerEvent>,
}

impl Worker {
    async fn run(mut self) {
        info!(
            session = %self.session,
            transport = self.transport.name(),
            "Bridge worker started"
        );

        match self.establish().await {
            Ok(true) => {
                self.emit(WorkerEvent::Ready).await;
                self.pump().await;
            }
            Ok(false) => {
                debug!(session = %self.session, "Shutdown requested while connecting");
            }
            Err(event) => {
                warn!(session = %self.session, event = ?event, "Peer connection failed");
                self.emit(event).await;
            }
        }

        if let Err(e) = self.transport.close().await {
            debug!(session = %self.session, error = %e, "Transport close failed");
        }
        info!(session = %self.session, "Bridge worker stopped");
    }

    /// Connect and wait for `connection_ready`.
    /// Returns `Ok(false)` if the caller gave up first.
    async fn establish(&mut self) -> Result<bool, WorkerEvent> {
        let transport = &mut *self.transport;
        let commands = &mut self.commands;

        tokio::select! {
            result = handshake(transport) => {
                result.map(|()| true).map_err(WorkerEvent::from_transport_error)
            }
            cmd = commands.recv() => {
                debug!(command = ?cmd, "Command received before the peer was ready");
                Ok(false)
            }
        }
    }

    /// Multiplex the outbound queue and inbound frames until either side stops
    async fn pump(&mut self) {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Send(msg)) => {
                        debug!(session = %self.session, frame = ?msg, "Sending frame");
                        if let Err(e) = self.transport.send(msg).await {
                            warn!(session = %self.session, error = %e, "Send to peer failed");
                            self.emit(WorkerEvent::from_transport_error(e)).await;
                            return;
                        }
                    }
                    Some(Command::Shutdown) | None => {
                        if let Err(e) = self.transport.send(BridgeMsg::Close).await {
                            debug!(session = %self.session, error = %e, "Close frame not delivered");
                        }
                        return;
                    }
                },
                frame = self.transport.recv() => match frame {
                    Ok(Some(PeerMsg::ResetResult { state })) => {
                        self.emit(WorkerEvent::ResetResult(state)).await;
                    }
                    Ok(Some(PeerMsg::ActionResult { state })) => {
                        self.emit(WorkerEvent::ActionResult(state)).await;
                    }
                    Ok(Some(PeerMsg::ConnectionReady)) => {
                        warn!(session = %self.session, "Duplicate connection_ready ignored");
                    }
                    Ok(None) => {
                        warn!(session = %self.session, "Peer disconnected");
                        self.emit(WorkerEvent::ConnectionLost("peer disconnected".to_string()))
                            .await;
                        return;
                    }
                    Err(e) => {
                        warn!(session = %self.session, error = %e, "Receive from peer failed");
                        self.emit(WorkerEvent::from_transport_error(e)).await;
                        return;
                    }
                },
            }
        }
    }

    async fn emit(&self, event: WorkerEvent) {
        if self.events.send(event).await.is_err() {
            debug!(session = %self.session, "Result queue closed, event dropped");
        }
    }
}

async fn handshake(transport: &mut dyn PeerTransport) -> Result<(), TransportError> {
    transport.connect().await?;
    match transport.recv().await? {
        Some(PeerMsg::ConnectionReady) => Ok(()),
        Some(other) => Err(TransportError::Protocol(format!(
            "expected connection_ready, got {other:?}"
        ))),
        None => Err(TransportError::Closed),
    }
}
