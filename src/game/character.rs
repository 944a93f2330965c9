//! Fighter state machine, per-action timers and per-frame update

use tracing::error;

use super::hitbox::{Hitbox, Rect};
use super::physics::{AttackKind, AttackStats, FighterStats, PhysicsSystem};
use super::Action;

/// Fighter state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharacterState {
    #[default]
    Idle,
    Walking,
    Jumping,
    Attacking,
    Guarding,
    /// Stunned after an unguarded hit
    Hit,
    /// Stunned after a guarded hit
    GuardHit,
}

impl CharacterState {
    /// Number of distinct states, used to normalize `code()`
    pub const COUNT: u8 = 7;

    /// Stable numeric code for observations
    pub fn code(self) -> u8 {
        match self {
            CharacterState::Idle => 0,
            CharacterState::Walking => 1,
            CharacterState::Jumping => 2,
            CharacterState::Attacking => 3,
            CharacterState::Guarding => 4,
            CharacterState::Hit => 5,
            CharacterState::GuardHit => 6,
        }
    }

    pub fn is_stunned(self) -> bool {
        matches!(self, CharacterState::Hit | CharacterState::GuardHit)
    }
}

/// One fighter (authoritative)
#[derive(Debug, Clone)]
pub struct Character {
    // Position and movement
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub facing: i8,

    // Combat
    pub health: u32,
    pub state: CharacterState,
    pub is_jumping: bool,
    pub is_attacking: bool,
    pub is_guarding: bool,
    pub hurtbox: Hitbox,
    pub attack_hitbox: Hitbox,
    pub current_attack: Option<AttackKind>,

    // Timers (seconds, count down to zero)
    pub attack_timer: f32,
    pub punch_cooldown_timer: f32,
    pub hit_stun_timer: f32,

    stats: FighterStats,
}

impl Character {
    /// Fighter standing on the floor at `x`
    pub fn new(x: f32, facing: i8, stats: FighterStats) -> Self {
        let y = PhysicsSystem::ground_y(stats.height);
        let mut hurtbox = Hitbox::new(stats.width, stats.height, 0);
        hurtbox.active = true;
        hurtbox.rect.x = x;
        hurtbox.rect.y = y;

        let punch = AttackStats::for_kind(AttackKind::Punch);

        Self {
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
            facing,
            health: stats.max_health,
            state: CharacterState::Idle,
            is_jumping: false,
            is_attacking: false,
            is_guarding: false,
            hurtbox,
            attack_hitbox: Hitbox::new(punch.width, punch.height, punch.damage),
            current_attack: None,
            attack_timer: 0.0,
            punch_cooldown_timer: 0.0,
            hit_stun_timer: 0.0,
            stats,
        }
    }

    pub fn stats(&self) -> &FighterStats {
        &self.stats
    }

    /// Body rectangle
    pub fn body(&self) -> Rect {
        Rect::new(self.x, self.y, self.stats.width, self.stats.height)
    }

    pub fn center_x(&self) -> f32 {
        self.body().center_x()
    }

    pub fn is_stunned(&self) -> bool {
        self.hit_stun_timer > 0.0
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Move the body and its boxes to `(x, y)` without touching velocity
    pub fn place(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.sync_boxes();
    }

    /// Translate one externally supplied action into state machine input.
    /// `toward_opponent` is the horizontal direction of the other fighter.
    pub fn apply_action(&mut self, action: Action, toward_opponent: i8) {
        if action != Action::Guard {
            self.release_guard();
        }

        match action {
            Action::Idle => self.stop(),
            Action::MoveForward => {
                self.move_dir(toward_opponent);
            }
            Action::MoveBackward => {
                self.move_dir(-toward_opponent);
            }
            Action::Jump => {
                self.jump();
            }
            Action::Attack1 => {
                self.attack(AttackKind::Punch);
            }
            Action::Attack2 => {
                self.attack(AttackKind::Kick);
            }
            Action::Guard => {
                self.guard();
            }
        }
    }

    /// Walk left (-1) or right (+1). Returns false if the input was refused.
    pub fn move_dir(&mut self, direction: i8) -> bool {
        if self.is_stunned() || self.is_attacking || self.is_guarding {
            return false;
        }
        let direction = direction.signum();
        if direction == 0 {
            return false;
        }

        self.vel_x = direction as f32 * self.stats.walk_speed;
        self.facing = direction;
        if !self.is_jumping {
            self.state = CharacterState::Walking;
        }
        true
    }

    pub fn jump(&mut self) -> bool {
        if self.is_stunned() || self.is_jumping || self.is_attacking || self.is_guarding {
            return false;
        }

        self.vel_y = self.stats.jump_velocity;
        self.is_jumping = true;
        self.state = CharacterState::Jumping;
        true
    }

    pub fn attack(&mut self, kind: AttackKind) -> bool {
        if self.is_stunned()
            || self.is_guarding
            || self.is_attacking
            || self.punch_cooldown_timer > 0.0
        {
            return false;
        }

        let stats = AttackStats::for_kind(kind);
        self.attack_hitbox = Hitbox::new(stats.width, stats.height, stats.damage);
        self.attack_hitbox.active = true;
        self.current_attack = Some(kind);
        self.is_attacking = true;
        self.attack_timer = stats.duration;
        self.punch_cooldown_timer = stats.cooldown;
        self.state = CharacterState::Attacking;
        if !self.is_jumping {
            self.vel_x = 0.0;
        }
        self.place_attack_box();
        true
    }

    pub fn guard(&mut self) -> bool {
        if self.is_stunned() || self.is_attacking || self.is_jumping {
            return false;
        }

        self.is_guarding = true;
        self.vel_x = 0.0;
        self.state = CharacterState::Guarding;
        true
    }

    pub fn release_guard(&mut self) {
        if self.is_guarding {
            self.is_guarding = false;
            if self.state == CharacterState::Guarding {
                self.state = CharacterState::Idle;
            }
        }
    }

    /// Idle input: drop lingering horizontal velocity
    pub fn stop(&mut self) {
        if self.is_stunned() {
            return;
        }
        self.vel_x = 0.0;
        if self.state == CharacterState::Walking {
            self.state = CharacterState::Idle;
        }
    }

    /// Apply incoming damage. Guarding halves it (floor division).
    /// Returns the health actually removed.
    pub fn take_damage(&mut self, damage: u32) -> u32 {
        let (amount, state) = if self.is_guarding {
            (damage / 2, CharacterState::GuardHit)
        } else {
            (damage, CharacterState::Hit)
        };

        let before = self.health;
        self.health = self.health.saturating_sub(amount);
        self.state = state;
        self.hit_stun_timer = self.stats.hit_stun;

        // Hard interrupt: nothing else drives this fighter until stun ends
        self.is_attacking = false;
        self.is_guarding = false;
        self.attack_hitbox.active = false;
        self.current_attack = None;
        self.attack_timer = 0.0;
        self.vel_x = 0.0;
        self.vel_y = 0.0;

        self.check_invariants();
        before - self.health
    }

    /// Advance one fixed step
    pub fn update(&mut self, dt: f32) {
        // Timers
        if self.hit_stun_timer > 0.0 {
            self.hit_stun_timer = (self.hit_stun_timer - dt).max(0.0);
            if self.hit_stun_timer <= 0.0 {
                self.state = CharacterState::Idle;
            }
        }
        if self.is_attacking {
            self.attack_timer = (self.attack_timer - dt).max(0.0);
        }
        self.punch_cooldown_timer = (self.punch_cooldown_timer - dt).max(0.0);

        if self.is_stunned() {
            self.vel_x = 0.0;
            self.vel_y = 0.0;
            return;
        }

        // Gravity and position
        let (x, y, vel_y) =
            PhysicsSystem::integrate(self.x, self.y, self.vel_x, self.vel_y, dt, &self.stats);
        self.x = PhysicsSystem::clamp_to_arena(x, self.stats.width);
        let (y, vel_y, grounded) = PhysicsSystem::resolve_ground(y, vel_y, self.stats.height);
        self.y = y;
        self.vel_y = vel_y;
        self.is_jumping = !grounded;

        self.hurtbox.rect = self.body();

        // Attack window
        if self.is_attacking {
            if self.attack_timer <= 0.0 {
                self.end_attack();
            } else {
                self.place_attack_box();
            }
        }

        self.resolve_state();
        self.check_invariants();
    }

    fn end_attack(&mut self) {
        self.is_attacking = false;
        self.attack_hitbox.active = false;
        self.current_attack = None;
        self.attack_timer = 0.0;
    }

    fn place_attack_box(&mut self) {
        let body = self.body();
        self.attack_hitbox
            .place_in_front(&body, self.stats.height / 4.0, self.facing);
    }

    fn sync_boxes(&mut self) {
        self.hurtbox.rect = self.body();
        if self.is_attacking {
            self.place_attack_box();
        }
    }

    /// Settle the state from the tracked flags
    fn resolve_state(&mut self) {
        self.state = if self.is_attacking {
            CharacterState::Attacking
        } else if self.is_guarding {
            CharacterState::Guarding
        } else if self.is_jumping {
            CharacterState::Jumping
        } else if self.vel_x != 0.0 {
            CharacterState::Walking
        } else {
            CharacterState::Idle
        };
    }

    fn check_invariants(&self) {
        if self.attack_hitbox.active && !self.is_attacking {
            error!(state = ?self.state, "Attack box active outside an attack window");
            debug_assert!(false, "attack box active while not attacking");
        }
        if self.health > self.stats.max_health {
            error!(health = self.health, max = self.stats.max_health, "Health above maximum");
            debug_assert!(false, "health above maximum");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::time::tick_delta;

    fn fighter() -> Character {
        Character::new(100.0, 1, FighterStats::default())
    }

    fn run(c: &mut Character, ticks: usize) {
        for _ in 0..ticks {
            c.update(tick_delta());
        }
    }

    #[test]
    fn starts_idle_on_the_floor() {
        let c = fighter();
        assert_eq!(c.state, CharacterState::Idle);
        assert_eq!(c.y, 500.0);
        assert_eq!(c.health, 100);
        assert!(c.hurtbox.active);
        assert!(!c.attack_hitbox.active);
    }

    #[test]
    fn guard_halves_damage() {
        let mut c = fighter();
        assert!(c.guard());
        assert_eq!(c.take_damage(31), 15);
        assert_eq!(c.health, 85);
        assert_eq!(c.state, CharacterState::GuardHit);

        let mut c = fighter();
        assert_eq!(c.take_damage(31), 31);
        assert_eq!(c.health, 69);
        assert_eq!(c.state, CharacterState::Hit);
    }

    #[test]
    fn health_never_goes_below_zero() {
        let mut c = fighter();
        for damage in [40, 40, 40, 250, u32::MAX] {
            c.take_damage(damage);
            assert!(c.health <= 100);
        }
        assert_eq!(c.health, 0);
        assert!(!c.is_alive());
    }

    #[test]
    fn attack_window_opens_and_closes() {
        let mut c = fighter();
        assert!(c.attack(AttackKind::Punch));
        assert!(c.attack_hitbox.active);
        assert_eq!(c.state, CharacterState::Attacking);
        assert_eq!(c.attack_hitbox.rect.x, 150.0);

        // Cannot restart while the window is open
        assert!(!c.attack(AttackKind::Kick));

        run(&mut c, 20);
        assert!(!c.is_attacking);
        assert!(!c.attack_hitbox.active);
        assert_eq!(c.state, CharacterState::Idle);

        // Cooldown still running after the window closed
        assert!(c.punch_cooldown_timer > 0.0);
        assert!(!c.attack(AttackKind::Punch));

        run(&mut c, 20);
        assert!(c.attack(AttackKind::Punch));
    }

    #[test]
    fn hit_stun_blocks_input_then_recovers() {
        let mut c = fighter();
        assert!(c.move_dir(1));
        c.take_damage(10);
        assert!(!c.move_dir(1));
        assert!(!c.jump());
        assert!(!c.attack(AttackKind::Punch));
        assert!(!c.guard());
        assert_eq!(c.vel_x, 0.0);

        run(&mut c, 5);
        assert_eq!(c.state, CharacterState::Hit);
        assert_eq!(c.vel_x, 0.0);

        run(&mut c, 20);
        assert_eq!(c.state, CharacterState::Idle);
        assert!(c.move_dir(-1));
        assert_eq!(c.facing, -1);
    }

    #[test]
    fn hit_interrupts_attack() {
        let mut c = fighter();
        c.attack(AttackKind::Kick);
        c.take_damage(10);
        assert!(!c.is_attacking);
        assert!(!c.attack_hitbox.active);
        assert_eq!(c.state, CharacterState::Hit);
    }

    #[test]
    fn jump_lands_back_on_floor() {
        let mut c = fighter();
        assert!(c.jump());
        assert!(!c.jump());
        assert!(!c.guard());
        run(&mut c, 10);
        assert!(c.y < 500.0);
        assert_eq!(c.state, CharacterState::Jumping);

        run(&mut c, 120);
        assert_eq!(c.y, 500.0);
        assert!(!c.is_jumping);
        assert_eq!(c.state, CharacterState::Idle);
    }

    #[test]
    fn movement_refused_while_guarding_or_attacking() {
        let mut c = fighter();
        c.guard();
        assert!(!c.move_dir(1));
        c.release_guard();
        assert_eq!(c.state, CharacterState::Idle);

        c.attack(AttackKind::Punch);
        assert!(!c.move_dir(-1));
        assert!(!c.guard());
    }

    #[test]
    fn walking_persists_until_idle() {
        let mut c = fighter();
        c.apply_action(Action::MoveForward, 1);
        run(&mut c, 3);
        assert_eq!(c.state, CharacterState::Walking);
        assert!(c.x > 100.0);

        c.apply_action(Action::Idle, 1);
        let x = c.x;
        run(&mut c, 3);
        assert_eq!(c.x, x);
        assert_eq!(c.state, CharacterState::Idle);
    }

    #[test]
    fn backward_moves_away_from_opponent() {
        let mut c = fighter();
        c.apply_action(Action::MoveBackward, 1);
        run(&mut c, 3);
        assert!(c.x < 100.0);
        assert_eq!(c.facing, -1);
    }

    #[test]
    fn walls_hold_the_body() {
        let mut c = Character::new(5.0, -1, FighterStats::default());
        c.move_dir(-1);
        run(&mut c, 30);
        assert_eq!(c.x, 0.0);
    }

    #[test]
    fn guard_is_held_only_while_requested() {
        let mut c = fighter();
        c.apply_action(Action::Guard, 1);
        run(&mut c, 1);
        assert_eq!(c.state, CharacterState::Guarding);
        c.apply_action(Action::Guard, 1);
        run(&mut c, 1);
        assert!(c.is_guarding);

        c.apply_action(Action::Idle, 1);
        run(&mut c, 1);
        assert!(!c.is_guarding);
        assert_eq!(c.state, CharacterState::Idle);
    }
}
