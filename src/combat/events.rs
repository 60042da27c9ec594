//! Events produced by the combat core
//!
//! A `combat_update` snapshot follows every mutation; the other events are
//! incremental notifications for UI feedback and audit.

use serde::{Deserialize, Serialize};

use super::action::{ActionType, BonusActionType, HoldTrigger};
use super::attack::AttackResolution;
use super::combatant::{Controller, DamageReport};
use super::death::DeathSaveOutcome;
use super::encounter::{Encounter, EnvironmentFeature};

/// Why an encounter stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Every player character is dead
    PartyDefeated,
    /// Ended on request
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CombatEvent {
    CombatUpdate {
        encounter: Box<Encounter>,
    },
    Pass {
        actor_id: String,
        round: u32,
    },
    Hold {
        actor_id: String,
        trigger: HoldTrigger,
    },
    HeldTriggered {
        holder_id: String,
        /// Combatant whose action fired the hold; None at end of round
        trigger_actor_id: Option<String>,
    },
    Move {
        actor_id: String,
        description: Option<String>,
    },
    BonusAction {
        actor_id: String,
        bonus: BonusActionType,
        /// HP restored by a healing bonus action
        healed: Option<i32>,
    },
    DeathSave {
        actor_id: String,
        /// None when damage caused the failure instead of a roll
        roll: Option<u32>,
        outcome: DeathSaveOutcome,
        successes: u8,
        failures: u8,
    },
    Defeated {
        combatant_id: String,
        name: String,
        controller: Controller,
    },
    EnvironmentUpdate {
        features: Vec<EnvironmentFeature>,
    },
    CombatResult {
        attacker_id: String,
        target_id: String,
        action: ActionType,
        resolution: AttackResolution,
        damage: DamageReport,
        /// Attacker's threat after this attack
        threat: u32,
    },
    Narration {
        actor_id: Option<String>,
        text: String,
        /// Text came from the built-in templates rather than the narrator
        fallback: bool,
    },
    CombatEnded {
        reason: EndReason,
    },
}

impl CombatEvent {
    /// Wire name of the event
    pub fn kind(&self) -> &'static str {
        match self {
            CombatEvent::CombatUpdate { .. } => "combat_update",
            CombatEvent::Pass { .. } => "pass",
            CombatEvent::Hold { .. } => "hold",
            CombatEvent::HeldTriggered { .. } => "held_triggered",
            CombatEvent::Move { .. } => "move",
            CombatEvent::BonusAction { .. } => "bonus_action",
            CombatEvent::DeathSave { .. } => "death_save",
            CombatEvent::Defeated { .. } => "defeated",
            CombatEvent::EnvironmentUpdate { .. } => "environment_update",
            CombatEvent::CombatResult { .. } => "combat_result",
            CombatEvent::Narration { .. } => "narration",
            CombatEvent::CombatEnded { .. } => "combat_ended",
        }
    }

    pub fn update(encounter: &Encounter) -> Self {
        CombatEvent::CombatUpdate {
            encounter: Box::new(encounter.clone()),
        }
    }
}
