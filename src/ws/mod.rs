//! Peer wire protocol and the WebSocket endpoint the renderer connects to

pub mod handler;
pub mod protocol;
