//! Combat system - attack box against hurtbox resolution

use tracing::{debug, error};

use super::character::Character;
use super::Side;

/// Hit result from combat resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitResult {
    pub attacker: Side,
    /// Damage carried by the attack box
    pub damage: u32,
    /// Health actually removed from the defender
    pub applied: u32,
    pub guarded: bool,
    pub defender_health: u32,
}

/// Resolves attacks between two fighters
pub struct CombatSystem;

impl CombatSystem {
    /// Check `attacker`'s attack box against `defender`'s hurtbox and apply
    /// at most one hit. The attack box is switched off on contact so an
    /// activation can deal damage only once.
    pub fn resolve(
        attacker_side: Side,
        attacker: &mut Character,
        defender: &mut Character,
    ) -> Option<HitResult> {
        let damage = Self::contact(attacker_side, attacker, defender)?;
        attacker.attack_hitbox.active = false;
        Some(Self::apply_hit(attacker_side, damage, defender))
    }

    /// Resolve both attack directions for one tick.
    /// Contacts are detected before any damage lands, so a trade hits both
    /// fighters whichever side is evaluated first.
    pub fn resolve_exchange(p1: &mut Character, p2: &mut Character) -> Vec<HitResult> {
        let p1_contact = Self::contact(Side::P1, p1, p2);
        let p2_contact = Self::contact(Side::P2, p2, p1);

        let mut hits = Vec::with_capacity(2);
        if let Some(damage) = p1_contact {
            p1.attack_hitbox.active = false;
            hits.push(Self::apply_hit(Side::P1, damage, p2));
        }
        if let Some(damage) = p2_contact {
            p2.attack_hitbox.active = false;
            hits.push(Self::apply_hit(Side::P2, damage, p1));
        }
        hits
    }

    /// Damage of the attack box if it currently overlaps the defender
    fn contact(attacker_side: Side, attacker: &mut Character, defender: &Character) -> Option<u32> {
        if !attacker.attack_hitbox.active {
            return None;
        }
        if !attacker.is_attacking {
            error!(side = ?attacker_side, "Stale attack box reached combat resolution");
            debug_assert!(false, "stale attack box");
            attacker.attack_hitbox.active = false;
            return None;
        }
        if !attacker.attack_hitbox.is_colliding(&defender.hurtbox) {
            return None;
        }
        Some(attacker.attack_hitbox.damage)
    }

    fn apply_hit(attacker_side: Side, damage: u32, defender: &mut Character) -> HitResult {
        let guarded = defender.is_guarding;
        let applied = defender.take_damage(damage);

        debug!(
            attacker = ?attacker_side,
            damage,
            applied,
            guarded,
            defender_health = defender.health,
            "Hit registered"
        );

        HitResult {
            attacker: attacker_side,
            damage,
            applied,
            guarded,
            defender_health: defender.health,
        }
    }
}
