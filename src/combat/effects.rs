//! Status effects system
//!
//! Replaces per-combatant boolean flags with a set of effects that each carry
//! their own expiry rule:
//! - Round-scoped effects (dodging, disengaged, dashing, spent reaction) clear
//!   when the initiative order wraps around
//! - Rage lasts until the encounter ends
//! - Hidden lasts until the hider makes an attack

use serde::{Deserialize, Serialize};

/// Types of status effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    /// Raging - bonus melee damage
    Raging,
    /// Dodging - attacks against this combatant roll with disadvantage
    Dodging,
    /// Disengaged - cannot be the target of opportunity attacks
    Disengaged,
    /// Dashing - doubled movement this round
    Dashing,
    /// Hidden - next attack rolls with advantage
    Hidden,
    /// Reaction used this round
    ReactionSpent,
}

impl EffectType {
    /// Default expiry rule for this effect
    pub fn default_expiry(&self) -> Expiry {
        match self {
            EffectType::Raging => Expiry::EndOfEncounter,
            EffectType::Hidden => Expiry::OnAttack,
            EffectType::Dodging
            | EffectType::Disengaged
            | EffectType::Dashing
            | EffectType::ReactionSpent => Expiry::RoundStart,
        }
    }
}

/// When an effect stops applying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiry {
    /// Cleared when the round counter increments
    RoundStart,
    /// Cleared when the bearer makes an attack
    OnAttack,
    /// Never cleared while the encounter runs
    EndOfEncounter,
}

/// A status effect instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub effect_type: EffectType,
    pub expiry: Expiry,
    /// Round in which the effect was applied
    pub applied_round: u32,
}

impl StatusEffect {
    /// Create an effect with its default expiry
    pub fn new(effect_type: EffectType, round: u32) -> Self {
        Self {
            effect_type,
            expiry: effect_type.default_expiry(),
            applied_round: round,
        }
    }
}

/// Effects on a single combatant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectSet {
    effects: Vec<StatusEffect>,
}

impl EffectSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an effect; re-applying an existing type refreshes its round.
    pub fn add(&mut self, effect: StatusEffect) {
        if let Some(existing) = self
            .effects
            .iter_mut()
            .find(|e| e.effect_type == effect.effect_type)
        {
            *existing = effect;
        } else {
            self.effects.push(effect);
        }
    }

    /// Convenience for applying an effect type with its default expiry
    pub fn apply(&mut self, effect_type: EffectType, round: u32) {
        self.add(StatusEffect::new(effect_type, round));
    }

    pub fn has(&self, effect_type: EffectType) -> bool {
        self.effects.iter().any(|e| e.effect_type == effect_type)
    }

    /// Drop every effect with the given expiry rule, returning the removed types
    pub fn expire(&mut self, expiry: Expiry) -> Vec<EffectType> {
        let expired: Vec<EffectType> = self
            .effects
            .iter()
            .filter(|e| e.expiry == expiry)
            .map(|e| e.effect_type)
            .collect();
        self.effects.retain(|e| e.expiry != expiry);
        expired
    }
}
