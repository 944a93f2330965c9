//! Snapshot building for the wire

use crate::ws::protocol::{GameState, OBSERVATION_LEN};

use super::character::{Character, CharacterState};
use super::physics::{ARENA_HEIGHT, ARENA_WIDTH};
use super::{MatchSimulation, Side};

/// Builds normalized state frames from the simulation
pub struct SnapshotBuilder {
    /// Snapshots built since creation
    built: u64,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self { built: 0 }
    }

    pub fn built(&self) -> u64 {
        self.built
    }

    /// Build a state frame.
    /// Observation layout: `[p1_x, p1_y, p1_health, p1_state, p2_x, p2_y, p2_health, p2_state]`
    pub fn build(&mut self, sim: &MatchSimulation) -> GameState {
        self.built += 1;

        let max_health = sim.config().fighter.max_health.max(1) as f32;
        let p1 = sim.fighter(Side::P1);
        let p2 = sim.fighter(Side::P2);

        let mut observation = Vec::with_capacity(OBSERVATION_LEN);
        observation.extend(Self::features(p1, max_health));
        observation.extend(Self::features(p2, max_health));

        GameState {
            observation,
            p1_health: p1.health as f32 / max_health,
            p2_health: p2.health as f32 / max_health,
            p1_pos_x: p1.x / ARENA_WIDTH,
            p2_pos_x: p2.x / ARENA_WIDTH,
            round_over: !sim.is_running(),
            p1_pos_y: p1.y / ARENA_HEIGHT,
            p2_pos_y: p2.y / ARENA_HEIGHT,
            frame: sim.frame_count(),
            round_timer: sim.round_timer(),
            winner: sim.outcome(),
        }
    }

    fn features(fighter: &Character, max_health: f32) -> [f32; 4] {
        [
            fighter.x / ARENA_WIDTH,
            fighter.y / ARENA_HEIGHT,
            fighter.health as f32 / max_health,
            fighter.state.code() as f32 / (CharacterState::COUNT - 1) as f32,
        ]
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Action, RoundOutcome};

    #[test]
    fn initial_snapshot_is_normalized() {
        let sim = MatchSimulation::default();
        let mut builder = SnapshotBuilder::new();
        let state = builder.build(&sim);

        assert_eq!(state.observation.len(), OBSERVATION_LEN);
        assert!(state.observation.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(state.p1_health, 1.0);
        assert_eq!(state.p2_health, 1.0);
        assert_eq!(state.p1_pos_x, 0.125);
        assert!(!state.round_over);
        assert_eq!(state.round_timer, 99);
        assert_eq!(builder.built(), 1);
    }

    #[test]
    fn default_builder_counts_from_zero() {
        let mut builder = SnapshotBuilder::default();
        assert_eq!(builder.built(), 0);
        builder.build(&MatchSimulation::default());
        builder.build(&MatchSimulation::default());
        assert_eq!(builder.built(), 2);
    }

    #[test]
    fn finished_round_carries_winner() {
        let mut sim = MatchSimulation::default();
        sim.fighter_mut(Side::P1).health = 0;
        sim.step(Action::Idle, Action::Idle);

        let state = SnapshotBuilder::new().build(&sim);
        assert!(state.round_over);
        assert_eq!(state.winner, Some(RoundOutcome::P2));
        assert_eq!(state.p1_health, 0.0);
        assert_eq!(state.frame, 1);
    }
}
