//! Match simulation modules

pub mod character;
pub mod combat;
pub mod hitbox;
pub mod r#match;
pub mod physics;
pub mod snapshot;

pub use character::{Character, CharacterState};
pub use r#match::{
    EndReason, MatchConfig, MatchPhase, MatchSimulation, RoundOutcome, TickReport,
};

use serde::{Deserialize, Serialize};

/// Which fighter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    P1,
    P2,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::P1 => Side::P2,
            Side::P2 => Side::P1,
        }
    }
}

/// Discrete per-tick input for one fighter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Action {
    #[default]
    Idle,
    /// Walk toward the opponent
    MoveForward,
    /// Walk away from the opponent
    MoveBackward,
    Jump,
    /// Punch
    Attack1,
    /// Kick
    Attack2,
    /// Hold guard for this tick
    Guard,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Idle,
        Action::MoveForward,
        Action::MoveBackward,
        Action::Jump,
        Action::Attack1,
        Action::Attack2,
        Action::Guard,
    ];

    /// Wire code
    pub fn code(self) -> u8 {
        match self {
            Action::Idle => 0,
            Action::MoveForward => 1,
            Action::MoveBackward => 2,
            Action::Jump => 3,
            Action::Attack1 => 4,
            Action::Attack2 => 5,
            Action::Guard => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Action> {
        Self::ALL.get(code as usize).copied()
    }

    /// Unknown codes fall back to `Idle`
    pub fn from_code_lossy(code: u8) -> Action {
        Self::from_code(code).unwrap_or_default()
    }
}
