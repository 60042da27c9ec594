//! Attack and spell resolution
//!
//! Pure apart from the RNG it is handed: computes to-hit and damage, never
//! touches combatant state. The encounter applies the result.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::dice::{is_critical, is_fumble, roll_d20_with, Advantage, DiceRoll};

/// Outcome of one attack roll plus damage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackResolution {
    /// The kept d20
    pub d20: u32,
    /// Total attack value (roll + bonus)
    pub attack_total: i32,
    pub target_ac: i32,
    pub advantage: Advantage,
    pub is_hit: bool,
    pub is_critical: bool,
    pub is_fumble: bool,
    /// Individual damage dice; empty on a miss
    pub damage_rolls: Vec<u32>,
    /// Damage dealt, never negative; 0 on a miss
    pub damage_total: i32,
}

/// Resolve an attack.
///
/// A natural 1 always misses and a natural 20 always hits. Critical hits
/// double the number of damage dice, not the flat modifier. `roll_override`
/// pins the d20 and ignores advantage.
pub fn resolve_attack<R: Rng + ?Sized>(
    attack_bonus: i32,
    target_ac: i32,
    damage: &DiceRoll,
    roll_override: Option<u32>,
    advantage: Advantage,
    rng: &mut R,
) -> AttackResolution {
    let (d20, advantage) = match roll_override {
        Some(roll) => (roll.clamp(1, 20), Advantage::Normal),
        None => (roll_d20_with(rng, advantage), advantage),
    };

    let critical = is_critical(d20);
    let fumble = is_fumble(d20);
    let attack_total = (d20 as i32).saturating_add(attack_bonus);
    let hit = critical || (!fumble && attack_total >= target_ac);

    let (damage_rolls, damage_total) = if hit {
        let outcome = if critical {
            damage.roll_critical(rng)
        } else {
            damage.roll(rng)
        };
        (outcome.rolls, outcome.total.max(0))
    } else {
        (Vec::new(), 0)
    };

    AttackResolution {
        d20,
        attack_total,
        target_ac,
        advantage,
        is_hit: hit,
        is_critical: critical,
        is_fumble: fumble,
        damage_rolls,
        damage_total,
    }
}

/// Threat earned by a damaging hit
pub fn threat_for(resolution: &AttackResolution) -> u32 {
    resolution.damage_total.max(1) as u32
}
