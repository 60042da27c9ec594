//! Initiative rolling
//!
//! Each seed rolls d20 + its initiative modifier. The order is sorted by total
//! (highest first); ties go to the higher modifier, then to whichever seed was
//! supplied first.

use std::collections::HashSet;

use rand::Rng;
use tracing::debug;

use super::combatant::{Combatant, CombatantSeed};
use super::dice::{roll_d20, MAX_MODIFIER};
use super::error::CombatError;

/// Roll initiative for every seed and return the combatants in turn order
pub fn roll_initiative<R: Rng + ?Sized>(
    seeds: Vec<CombatantSeed>,
    rng: &mut R,
) -> Result<Vec<Combatant>, CombatError> {
    let rolls: Vec<u32> = seeds.iter().map(|_| roll_d20(rng)).collect();
    order_by_initiative(seeds, &rolls)
}

/// Build the turn order from pre-rolled d20s, one per seed
pub fn order_by_initiative(
    seeds: Vec<CombatantSeed>,
    rolls: &[u32],
) -> Result<Vec<Combatant>, CombatError> {
    if seeds.is_empty() {
        return Err(CombatError::precondition("an encounter needs at least one combatant"));
    }
    if rolls.len() != seeds.len() {
        return Err(CombatError::Internal(format!(
            "{} initiative rolls for {} combatants",
            rolls.len(),
            seeds.len()
        )));
    }

    let mut seen = HashSet::new();
    for seed in &seeds {
        if !seen.insert(seed.id.as_str()) {
            return Err(CombatError::precondition(format!(
                "duplicate combatant id: {}",
                seed.id
            )));
        }
        check_bonus("initiative modifier", seed.initiative_modifier)?;
        if let Some(attack) = &seed.attack {
            check_bonus("attack bonus", attack.attack_bonus)?;
        }
    }

    let mut order: Vec<Combatant> = seeds
        .into_iter()
        .zip(rolls)
        .map(|(seed, &d20)| {
            let total = (d20 as i32).saturating_add(seed.initiative_modifier);
            debug!(combatant = %seed.id, d20, total, "initiative rolled");
            Combatant::from_seed(seed, total)
        })
        .collect();

    // sort_by is stable, so equal keys keep their input order
    order.sort_by(|a, b| {
        b.initiative
            .cmp(&a.initiative)
            .then(b.initiative_modifier.cmp(&a.initiative_modifier))
    });

    Ok(order)
}

/// Reject bonuses outside the range dice notation accepts for modifiers
pub(crate) fn check_bonus(what: &str, bonus: i32) -> Result<i32, CombatError> {
    if (-MAX_MODIFIER..=MAX_MODIFIER).contains(&bonus) {
        Ok(bonus)
    } else {
        Err(CombatError::precondition(format!(
            "{} must be between -{} and {}, got {}",
            what, MAX_MODIFIER, MAX_MODIFIER, bonus
        )))
    }
}
