//! Peer transport frame definitions
//! These are the JSON wire types exchanged with the remote renderer

use serde::{Deserialize, Serialize};

use crate::game::{Action, RoundOutcome};

/// Length of `GameState::observation`
pub const OBSERVATION_LEN: usize = 8;

/// Frames sent from the bridge to the peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMsg {
    /// Start a fresh round
    Reset,

    /// Advance one frame with one action per fighter
    Action {
        #[serde(rename = "p1Action")]
        p1_action: u8,
        #[serde(rename = "p2Action")]
        p2_action: u8,
    },

    /// Session is ending
    Close,
}

impl BridgeMsg {
    pub fn action(p1: Action, p2: Action) -> Self {
        BridgeMsg::Action {
            p1_action: p1.code(),
            p2_action: p2.code(),
        }
    }
}

/// Frames sent from the peer to the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerMsg {
    /// Sent once, when the peer is ready to simulate
    ConnectionReady,

    /// Answer to `BridgeMsg::Reset`
    ResetResult { state: GameState },

    /// Answer to `BridgeMsg::Action`
    ActionResult { state: GameState },
}

/// Match state as seen by the controlling agent
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameState {
    /// Fixed-length feature vector
    pub observation: Vec<f32>,
    /// Health (0..1 when normalized, raw from some peers)
    pub p1_health: f32,
    pub p2_health: f32,
    pub p1_pos_x: f32,
    pub p2_pos_x: f32,
    pub round_over: bool,

    // Extras; peers may omit them
    #[serde(default)]
    pub p1_pos_y: f32,
    #[serde(default)]
    pub p2_pos_y: f32,
    #[serde(default)]
    pub frame: u64,
    #[serde(default)]
    pub round_timer: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<RoundOutcome>,
}

impl GameState {
    /// All-zero state, used when no answer arrived in time
    pub fn zeroed() -> Self {
        Self {
            observation: vec![0.0; OBSERVATION_LEN],
            ..Default::default()
        }
    }
}
