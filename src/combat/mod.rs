//! Combat system module
//!
//! Turn-based encounter resolution:
//! - Dice notation and d20 rolls with advantage
//! - Initiative ordering
//! - Attack and spell resolution
//! - Turn state machine with held turns, reactions and bonus actions
//! - Death saving throws
//! - Threat tracking and monster targeting

mod action;
mod advisor;
mod attack;
mod combatant;
mod death;
mod dice;
mod effects;
mod encounter;
mod error;
mod events;
mod initiative;
mod threat;

pub use action::{
    ActionRecord, ActionRequest, ActionType, BonusActionType, HoldDirective, HoldTrigger, Strike,
};
pub use advisor::{decide_monster_actions, MonsterDecision};
pub use attack::{resolve_attack, threat_for, AttackResolution};
pub use combatant::{AttackProfile, Combatant, CombatantSeed, Controller, DamageReport, LifeState};
pub use death::{DeathSaveOutcome, DeathSaves};
pub use dice::{parse_dice, roll_d20, Advantage, DiceError, DiceOutcome, DiceRoll};
pub use effects::{EffectSet, EffectType, Expiry, StatusEffect};
pub use encounter::{Encounter, EnvironmentFeature, DEFAULT_SELF_HEAL, RAGE_DAMAGE_BONUS};
pub use error::CombatError;
pub use events::{CombatEvent, EndReason};
pub use initiative::{order_by_initiative, roll_initiative};
pub use threat::{eligible_targets, select_target, TargetingPolicy, ThreatTable};
