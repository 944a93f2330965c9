//! Fighter physics and movement constraints

/// Arena width in pixels
pub const ARENA_WIDTH: f32 = 800.0;
/// Arena height in pixels (the floor sits at this y)
pub const ARENA_HEIGHT: f32 = 600.0;

/// Fighter body constants
#[derive(Debug, Clone, Copy)]
pub struct FighterStats {
    /// Body width
    pub width: f32,
    /// Body height
    pub height: f32,
    /// Horizontal walk speed (px/s)
    pub walk_speed: f32,
    /// Vertical launch velocity for a jump (negative is up)
    pub jump_velocity: f32,
    /// Downward acceleration (px/s²)
    pub gravity: f32,
    /// Health at round start
    pub max_health: u32,
    /// Seconds of hit-stun after taking damage
    pub hit_stun: f32,
}

impl Default for FighterStats {
    fn default() -> Self {
        Self {
            width: 50.0,
            height: 100.0,
            walk_speed: 200.0,
            jump_velocity: -400.0,
            gravity: 800.0,
            max_health: 100,
            hit_stun: 0.3,
        }
    }
}

/// The two attacks a fighter can throw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackKind {
    /// Fast, short-range hit (`Attack1`)
    Punch,
    /// Slower hit with more reach and damage (`Attack2`)
    Kick,
}

/// Attack stats per attack kind
#[derive(Debug, Clone, Copy)]
pub struct AttackStats {
    /// Damage per hit
    pub damage: u32,
    /// Seconds the attack box stays out
    pub duration: f32,
    /// Seconds before another attack may start
    pub cooldown: f32,
    /// Attack box width
    pub width: f32,
    /// Attack box height
    pub height: f32,
}

impl AttackStats {
    pub fn for_kind(kind: AttackKind) -> Self {
        match kind {
            AttackKind::Punch => Self {
                damage: 30,
                duration: 0.2,
                cooldown: 0.5,
                width: 33.0,
                height: 25.0,
            },
            AttackKind::Kick => Self {
                damage: 40,
                duration: 0.3,
                cooldown: 0.8,
                width: 45.0,
                height: 25.0,
            },
        }
    }
}

/// Physics system for fighter bodies
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Integrate gravity and velocity over `dt`
    /// Returns (new_x, new_y, new_vel_y)
    pub fn integrate(
        x: f32,
        y: f32,
        vel_x: f32,
        vel_y: f32,
        dt: f32,
        stats: &FighterStats,
    ) -> (f32, f32, f32) {
        let new_vel_y = vel_y + stats.gravity * dt;
        let new_x = x + vel_x * dt;
        let new_y = y + new_vel_y * dt;
        (new_x, new_y, new_vel_y)
    }

    /// Keep a body of `width` inside the arena walls
    pub fn clamp_to_arena(x: f32, width: f32) -> f32 {
        x.clamp(0.0, ARENA_WIDTH - width)
    }

    /// Floor y for a body of `height`
    pub fn ground_y(height: f32) -> f32 {
        ARENA_HEIGHT - height
    }

    /// Resolve contact with the floor
    /// Returns (new_y, new_vel_y, grounded)
    pub fn resolve_ground(y: f32, vel_y: f32, height: f32) -> (f32, f32, bool) {
        let floor = Self::ground_y(height);
        if y >= floor {
            (floor, 0.0, true)
        } else {
            (y, vel_y, false)
        }
    }

    /// Horizontal direction from `from_x` toward `to_x` (+1 or -1)
    pub fn direction_toward(from_x: f32, to_x: f32, fallback: i8) -> i8 {
        if to_x > from_x {
            1
        } else if to_x < from_x {
            -1
        } else {
            fallback
        }
    }
}
