//! Threat tracking
//!
//! Each attacker accumulates threat from the damage it deals. Scores only ever
//! grow within an encounter; monsters use them to pick whom to hit.

use std::collections::HashMap;

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::combatant::Combatant;

/// Per-attacker accumulated threat
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreatTable {
    scores: HashMap<String, u32>,
}

impl ThreatTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add threat for an attacker, returning its new score
    pub fn add(&mut self, attacker_id: &str, amount: u32) -> u32 {
        let score = self.scores.entry(attacker_id.to_string()).or_insert(0);
        *score = score.saturating_add(amount);
        *score
    }

    pub fn get(&self, attacker_id: &str) -> u32 {
        self.scores.get(attacker_id).copied().unwrap_or(0)
    }
}

/// How monsters choose among conscious players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetingPolicy {
    /// Uniformly random
    Random,
    /// Highest threat first; ties broken at random
    #[default]
    Threat,
}

/// Players a monster may attack: conscious player characters only
pub fn eligible_targets(order: &[Combatant]) -> Vec<&Combatant> {
    order
        .iter()
        .filter(|c| c.is_player() && c.current_hp > 0 && c.is_conscious())
        .collect()
}

/// Pick a target id for a monster, or None if nobody is standing
pub fn select_target<R: Rng + ?Sized>(
    order: &[Combatant],
    threat: &ThreatTable,
    policy: TargetingPolicy,
    rng: &mut R,
) -> Option<String> {
    let candidates = eligible_targets(order);
    let pool: Vec<&Combatant> = match policy {
        TargetingPolicy::Random => candidates,
        TargetingPolicy::Threat => {
            let top = candidates.iter().map(|c| threat.get(&c.id)).max()?;
            candidates
                .into_iter()
                .filter(|c| threat.get(&c.id) == top)
                .collect()
        }
    };
    pool.choose(rng).map(|c| c.id.clone())
}
