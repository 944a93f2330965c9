//! Match state and the fixed-timestep round loop

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::util::time::SIMULATION_TPS;

use super::character::Character;
use super::combat::{CombatSystem, HitResult};
use super::physics::{FighterStats, PhysicsSystem};
use super::{Action, Side};

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Round in progress
    Running,
    /// Round ended, terminal until `reset()`
    RoundOver,
}

/// How a finished round was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    P1,
    P2,
    Draw,
}

impl RoundOutcome {
    pub fn winner(self) -> Option<Side> {
        match self {
            RoundOutcome::P1 => Some(Side::P1),
            RoundOutcome::P2 => Some(Side::P2),
            RoundOutcome::Draw => None,
        }
    }
}

/// Why the round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Knockout,
    TimeUp,
}

/// Match configuration
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Round length in whole seconds
    pub round_seconds: u32,
    /// Simulation ticks per second
    pub tick_rate: u32,
    pub fighter: FighterStats,
    pub p1_spawn_x: f32,
    pub p2_spawn_x: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        let fighter = FighterStats::default();
        Self {
            round_seconds: 99,
            tick_rate: SIMULATION_TPS,
            p1_spawn_x: 100.0,
            p2_spawn_x: super::physics::ARENA_WIDTH - 100.0 - fighter.width,
            fighter,
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub frame: u64,
    pub hits: Vec<HitResult>,
    /// Set once the round is over
    pub outcome: Option<RoundOutcome>,
    pub end_reason: Option<EndReason>,
}

impl TickReport {
    pub fn round_over(&self) -> bool {
        self.outcome.is_some()
    }
}

/// The authoritative two-fighter match
#[derive(Debug, Clone)]
pub struct MatchSimulation {
    config: MatchConfig,
    p1: Character,
    p2: Character,
    phase: MatchPhase,
    round_timer: u32,
    frames_into_second: u32,
    frame_count: u64,
    outcome: Option<RoundOutcome>,
    end_reason: Option<EndReason>,
}

impl MatchSimulation {
    pub fn new(config: MatchConfig) -> Self {
        let (p1, p2) = Self::spawn(&config);
        Self {
            round_timer: config.round_seconds,
            config,
            p1,
            p2,
            phase: MatchPhase::Running,
            frames_into_second: 0,
            frame_count: 0,
            outcome: None,
            end_reason: None,
        }
    }

    fn spawn(config: &MatchConfig) -> (Character, Character) {
        (
            Character::new(config.p1_spawn_x, 1, config.fighter),
            Character::new(config.p2_spawn_x, -1, config.fighter),
        )
    }

    /// Start a fresh round with new fighters
    pub fn reset(&mut self) {
        let (p1, p2) = Self::spawn(&self.config);
        self.p1 = p1;
        self.p2 = p2;
        self.phase = MatchPhase::Running;
        self.round_timer = self.config.round_seconds;
        self.frames_into_second = 0;
        self.frame_count = 0;
        self.outcome = None;
        self.end_reason = None;
        debug!("Round reset");
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == MatchPhase::Running
    }

    pub fn outcome(&self) -> Option<RoundOutcome> {
        self.outcome
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    /// Whole seconds left on the round clock
    pub fn round_timer(&self) -> u32 {
        self.round_timer
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn fighter(&self, side: Side) -> &Character {
        match side {
            Side::P1 => &self.p1,
            Side::P2 => &self.p2,
        }
    }

    pub fn fighter_mut(&mut self, side: Side) -> &mut Character {
        match side {
            Side::P1 => &mut self.p1,
            Side::P2 => &mut self.p2,
        }
    }

    /// Advance one fixed tick with one action per fighter
    pub fn step(&mut self, p1_action: Action, p2_action: Action) -> TickReport {
        if self.phase == MatchPhase::RoundOver {
            debug!(frame = self.frame_count, "Step ignored, round is over");
            return self.report(Vec::new());
        }

        self.frame_count += 1;
        let dt = 1.0 / self.config.tick_rate as f32;

        // Apply inputs
        let p1_toward = PhysicsSystem::direction_toward(
            self.p1.center_x(),
            self.p2.center_x(),
            self.p1.facing,
        );
        let p2_toward = PhysicsSystem::direction_toward(
            self.p2.center_x(),
            self.p1.center_x(),
            self.p2.facing,
        );
        self.p1.apply_action(p1_action, p1_toward);
        self.p2.apply_action(p2_action, p2_toward);

        // Physics
        self.p1.update(dt);
        self.p2.update(dt);

        // Combat
        let hits = CombatSystem::resolve_exchange(&mut self.p1, &mut self.p2);

        // Round clock
        self.frames_into_second += 1;
        if self.frames_into_second >= self.config.tick_rate {
            self.frames_into_second = 0;
            self.round_timer = self.round_timer.saturating_sub(1);
        }

        self.check_round_end();
        self.report(hits)
    }

    fn report(&self, hits: Vec<HitResult>) -> TickReport {
        TickReport {
            frame: self.frame_count,
            hits,
            outcome: self.outcome,
            end_reason: self.end_reason,
        }
    }

    /// Evaluate termination once per tick, after physics and combat
    fn check_round_end(&mut self) {
        let p1_down = !self.p1.is_alive();
        let p2_down = !self.p2.is_alive();

        let (outcome, reason) = match (p1_down, p2_down) {
            (true, true) => (RoundOutcome::Draw, EndReason::Knockout),
            (false, true) => (RoundOutcome::P1, EndReason::Knockout),
            (true, false) => (RoundOutcome::P2, EndReason::Knockout),
            (false, false) if self.round_timer == 0 => {
                let outcome = match self.p1.health.cmp(&self.p2.health) {
                    std::cmp::Ordering::Greater => RoundOutcome::P1,
                    std::cmp::Ordering::Less => RoundOutcome::P2,
                    std::cmp::Ordering::Equal => RoundOutcome::Draw,
                };
                (outcome, EndReason::TimeUp)
            }
            (false, false) => return,
        };

        self.phase = MatchPhase::RoundOver;
        self.outcome = Some(outcome);
        self.end_reason = Some(reason);

        info!(
            frame = self.frame_count,
            outcome = ?outcome,
            reason = ?reason,
            p1_health = self.p1.health,
            p2_health = self.p2.health,
            "Round over"
        );
    }
}

impl Default for MatchSimulation {
    fn default() -> Self {
        Self::new(MatchConfig::default())
    }
}
