//! Bridge and transport errors

/// Errors raised by a peer transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Peer connection closed")]
    Closed,

    #[error("Unexpected frame from peer: {0}")]
    Protocol(String),

    #[error("Frame serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

/// Errors surfaced by `ControlBridge`
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The peer sent something outside the protocol; the bridge is closed
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Peer did not become ready within {0:?}")]
    ConnectTimeout(std::time::Duration),

    #[error("Peer connection lost before it became ready: {0}")]
    ConnectionLost(String),

    #[error("Another step or reset is already in flight")]
    Reentrant,

    #[error("Bridge is closed")]
    Closed,

    #[error("Failed to start bridge worker: {0}")]
    Spawn(#[from] std::io::Error),
}
