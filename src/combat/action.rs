//! Action requests and the append-only action log
//!
//! Requests arrive from the session layer one at a time, attributed to a
//! combatant. Each variant is dispatched exhaustively by the encounter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// When a held turn fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HoldTrigger {
    /// Act once the initiative order is about to wrap
    EndOfRound,
    /// Act right after the named combatant completes an action
    OnActorActs { actor_id: String },
}

/// A deferred turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldDirective {
    pub holder_id: String,
    pub trigger: HoldTrigger,
}

/// Bonus actions; none of them end the turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BonusActionType {
    HealSelf {
        /// Dice notation; defaults to 1d8+2
        #[serde(default)]
        dice: Option<String>,
    },
    Rage,
    Dodge,
    Disengage,
    Dash,
    Hide,
}

impl BonusActionType {
    pub fn name(&self) -> &'static str {
        match self {
            BonusActionType::HealSelf { .. } => "heal_self",
            BonusActionType::Rage => "rage",
            BonusActionType::Dodge => "dodge",
            BonusActionType::Disengage => "disengage",
            BonusActionType::Dash => "dash",
            BonusActionType::Hide => "hide",
        }
    }
}

/// Common fields of an attack-like request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strike {
    pub actor_id: String,
    pub target_id: String,
    /// Falls back to the actor's attack profile
    #[serde(default)]
    pub attack_bonus: Option<i32>,
    /// Falls back to the actor's attack profile
    #[serde(default)]
    pub damage: Option<String>,
    /// Fixed d20 for table-rolled dice
    #[serde(default)]
    pub roll_override: Option<u32>,
}

/// A structured action request from the session layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionRequest {
    Attack(Strike),
    Spell(Strike),
    OpportunityAttack(Strike),
    Move {
        actor_id: String,
        #[serde(default)]
        description: Option<String>,
    },
    Pass {
        actor_id: String,
    },
    Hold {
        actor_id: String,
        trigger: HoldTrigger,
    },
    BonusAction {
        actor_id: String,
        bonus: BonusActionType,
    },
    DeathSave {
        actor_id: String,
        #[serde(default)]
        roll_override: Option<u32>,
    },
}

impl ActionRequest {
    pub fn actor_id(&self) -> &str {
        match self {
            ActionRequest::Attack(s)
            | ActionRequest::Spell(s)
            | ActionRequest::OpportunityAttack(s) => &s.actor_id,
            ActionRequest::Move { actor_id, .. }
            | ActionRequest::Pass { actor_id }
            | ActionRequest::Hold { actor_id, .. }
            | ActionRequest::BonusAction { actor_id, .. }
            | ActionRequest::DeathSave { actor_id, .. } => actor_id,
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            ActionRequest::Attack(_) => ActionType::Attack,
            ActionRequest::Spell(_) => ActionType::Spell,
            ActionRequest::OpportunityAttack(_) => ActionType::OpportunityAttack,
            ActionRequest::Move { .. } => ActionType::Move,
            ActionRequest::Pass { .. } => ActionType::Pass,
            ActionRequest::Hold { .. } => ActionType::Hold,
            ActionRequest::BonusAction { .. } => ActionType::BonusAction,
            ActionRequest::DeathSave { .. } => ActionType::DeathSave,
        }
    }
}

/// Kind of a logged action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Attack,
    Spell,
    Move,
    Pass,
    Hold,
    BonusAction,
    DeathSave,
    OpportunityAttack,
}

/// One entry of the action log; never modified after it is appended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub actor_id: String,
    pub action: ActionType,
    pub target_id: Option<String>,
    pub outcome: Option<String>,
    pub round: u32,
    pub timestamp: DateTime<Utc>,
}

impl ActionRecord {
    pub fn new(actor_id: &str, action: ActionType, round: u32) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            action,
            target_id: None,
            outcome: None,
            round,
            timestamp: Utc::now(),
        }
    }

    pub fn with_target(mut self, target_id: &str) -> Self {
        self.target_id = Some(target_id.to_string());
        self
    }

    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::json!({
            "action": "attack",
            "actor_id": "fighter",
            "target_id": "goblin_a",
            "roll_override": 15
        });
        let req: ActionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.actor_id(), "fighter");
        assert_eq!(req.action_type(), ActionType::Attack);
        match req {
            ActionRequest::Attack(strike) => {
                assert_eq!(strike.roll_override, Some(15));
                assert!(strike.damage.is_none());
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_hold_and_bonus_wire_format() {
        let req: ActionRequest = serde_json::from_value(serde_json::json!({
            "action": "hold",
            "actor_id": "fighter",
            "trigger": { "kind": "on_actor_acts", "actor_id": "goblin_a" }
        }))
        .unwrap();
        assert_eq!(
            req,
            ActionRequest::Hold {
                actor_id: "fighter".into(),
                trigger: HoldTrigger::OnActorActs {
                    actor_id: "goblin_a".into()
                },
            }
        );

        let req: ActionRequest = serde_json::from_value(serde_json::json!({
            "action": "bonus_action",
            "actor_id": "barbarian",
            "bonus": { "kind": "rage" }
        }))
        .unwrap();
        assert_eq!(req.action_type(), ActionType::BonusAction);
    }
}
