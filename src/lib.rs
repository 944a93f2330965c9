//! Arcade Duel - two-fighter match simulation behind a synchronous control bridge
//!
//! - `game`: fixed-step fighting simulation (physics, hitboxes, round rules)
//! - `ws`: JSON frames exchanged with the peer and the WebSocket endpoint
//! - `bridge`: blocking `reset`/`step` API over an async peer transport
//! - `config`: environment configuration for the demo binary

pub mod bridge;
pub mod config;
pub mod game;
pub mod util;
pub mod ws;

pub use bridge::{BridgeConfig, BridgeError, ControlBridge, StepInfo, StepOutcome};
pub use game::{Action, MatchConfig, MatchSimulation};
