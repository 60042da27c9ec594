//! Death saving throws
//!
//! Only player characters at 0 HP roll death saves. Monsters at 0 HP are
//! simply dead.

use serde::{Deserialize, Serialize};

use super::combatant::{Combatant, LifeState};
use super::error::CombatError;

/// Death-save counters, each in 0..=3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeathSaves {
    pub successes: u8,
    pub failures: u8,
}

impl DeathSaves {
    pub fn reset(&mut self) {
        *self = DeathSaves::default();
    }

    fn add_failures(&mut self, n: u8) {
        self.failures = (self.failures + n).min(3);
    }

    fn add_success(&mut self) {
        self.successes = (self.successes + 1).min(3);
    }
}

/// Where a downed player stands after a death-save event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathSaveOutcome {
    /// Natural 20: back up with 1 HP
    Revived,
    /// Three successes
    Stable,
    /// Still rolling
    Dying,
    /// Three failures
    Dead,
}

/// Roll outcome to counters, for a natural d20 result
fn tally(saves: &mut DeathSaves, d20: u32) {
    match d20 {
        1 => saves.add_failures(2),
        10..=19 => saves.add_success(),
        _ => saves.add_failures(1),
    }
}

fn settle(combatant: &mut Combatant) -> DeathSaveOutcome {
    if combatant.death_saves.failures >= 3 {
        combatant.life = LifeState::Dead;
        DeathSaveOutcome::Dead
    } else if combatant.death_saves.successes >= 3 {
        combatant.life = LifeState::Unconscious { stable: true };
        DeathSaveOutcome::Stable
    } else {
        combatant.life = LifeState::Unconscious { stable: false };
        DeathSaveOutcome::Dying
    }
}

/// Check that a combatant may roll a death save right now
pub fn ensure_can_roll(combatant: &Combatant) -> Result<(), CombatError> {
    if !combatant.is_player() {
        return Err(CombatError::precondition("only player characters roll death saves"));
    }
    match combatant.life {
        LifeState::Conscious => Err(CombatError::precondition(format!(
            "{} is conscious and cannot roll a death save",
            combatant.name
        ))),
        LifeState::Dead => Err(CombatError::precondition(format!(
            "{} is dead",
            combatant.name
        ))),
        LifeState::Unconscious { stable: true } => Err(CombatError::precondition(format!(
            "{} is already stable",
            combatant.name
        ))),
        LifeState::Unconscious { stable: false } => Ok(()),
    }
}

/// Resolve a death-save roll for a dying player
pub fn resolve_death_save(
    combatant: &mut Combatant,
    d20: u32,
) -> Result<DeathSaveOutcome, CombatError> {
    ensure_can_roll(combatant)?;

    if d20 == 20 {
        combatant.death_saves.reset();
        combatant.current_hp = 1;
        combatant.life = LifeState::Conscious;
        return Ok(DeathSaveOutcome::Revived);
    }

    tally(&mut combatant.death_saves, d20);
    Ok(settle(combatant))
}

/// A damaging hit on a player already at 0 HP; no roll is consumed.
pub fn damage_while_down(
    combatant: &mut Combatant,
    damage: i32,
    critical: bool,
) -> DeathSaveOutcome {
    if combatant.is_dead() {
        return DeathSaveOutcome::Dead;
    }
    // A stabilised creature that takes damage starts its saves over
    if combatant.life == (LifeState::Unconscious { stable: true }) {
        combatant.death_saves.reset();
    }
    if damage >= combatant.max_hp {
        combatant.death_saves.failures = 3;
    } else {
        combatant.death_saves.add_failures(if critical { 2 } else { 1 });
    }
    settle(combatant)
}
