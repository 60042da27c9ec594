//! Monster decision advisor
//!
//! Read-only suggestions for upcoming monster turns, used by review tooling.
//! Unlike the live driver it is deterministic: it always proposes the
//! highest-threat player.

use serde::{Deserialize, Serialize};

use super::action::ActionType;
use super::combatant::Combatant;
use super::encounter::Encounter;
use super::threat::eligible_targets;

/// A proposed monster action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterDecision {
    pub actor_id: String,
    pub target_id: Option<String>,
    pub action: ActionType,
}

/// Propose up to `max` actions for the monsters acting next, starting at the
/// current slot and walking one full cycle of the order.
pub fn decide_monster_actions(encounter: &Encounter, max: usize) -> Vec<MonsterDecision> {
    let n = encounter.order.len();
    if !encounter.is_active() || max == 0 {
        return Vec::new();
    }

    let target = best_target(encounter);
    (0..n)
        .map(|offset| &encounter.order[(encounter.turn_index + offset) % n])
        .filter(|c| c.is_monster() && c.is_conscious())
        .take(max)
        .map(|monster| match (&monster.attack, &target) {
            (Some(_), Some(target_id)) => MonsterDecision {
                actor_id: monster.id.clone(),
                target_id: Some(target_id.clone()),
                action: ActionType::Attack,
            },
            _ => MonsterDecision {
                actor_id: monster.id.clone(),
                target_id: None,
                action: ActionType::Pass,
            },
        })
        .collect()
}

/// Highest threat, then lowest current HP, then earliest in the order
fn best_target(encounter: &Encounter) -> Option<String> {
    eligible_targets(&encounter.order)
        .into_iter()
        .enumerate()
        .min_by_key(|(pos, c): &(usize, &Combatant)| {
            (
                std::cmp::Reverse(encounter.threat.get(&c.id)),
                c.current_hp,
                *pos,
            )
        })
        .map(|(_, c)| c.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::combatant::{AttackProfile, CombatantSeed, Controller};
    use crate::combat::initiative::order_by_initiative;

    fn seed(id: &str, controller: Controller, hp: i32, armed: bool) -> CombatantSeed {
        CombatantSeed {
            id: id.into(),
            name: id.into(),
            controller,
            armor_class: 12,
            max_hp: hp,
            current_hp: None,
            temporary_hp: None,
            initiative_modifier: 0,
            attack: armed.then(|| AttackProfile {
                attack_bonus: 3,
                damage: "1d6".into(),
            }),
        }
    }

    fn encounter() -> Encounter {
        let order = order_by_initiative(
            vec![
                seed("fighter", Controller::Player, 20, false),
                seed("goblin_a", Controller::Monster, 7, true),
                seed("wizard", Controller::Player, 8, false),
                seed("goblin_b", Controller::Monster, 7, true),
                seed("ooze", Controller::Monster, 7, false),
            ],
            &[20, 16, 12, 8, 4],
        )
        .unwrap();
        Encounter::from_order(order)
    }

    #[test]
    fn test_prefers_threat_then_low_hp() {
        let mut enc = encounter();
        let decisions = decide_monster_actions(&enc, 5);
        assert_eq!(decisions.len(), 3);
        // No threat yet: the wizard has less HP
        assert_eq!(decisions[0].target_id.as_deref(), Some("wizard"));

        enc.threat.add("fighter", 6);
        let decisions = decide_monster_actions(&enc, 5);
        assert_eq!(decisions[0].actor_id, "goblin_a");
        assert_eq!(decisions[0].target_id.as_deref(), Some("fighter"));
        assert_eq!(decisions[0].action, ActionType::Attack);
    }

    #[test]
    fn test_unarmed_monster_passes_and_limit_applies() {
        let enc = encounter();
        let decisions = decide_monster_actions(&enc, 5);
        let ooze = decisions.iter().find(|d| d.actor_id == "ooze").unwrap();
        assert_eq!(ooze.action, ActionType::Pass);
        assert!(ooze.target_id.is_none());
        assert_eq!(decide_monster_actions(&enc, 1).len(), 1);
    }

    #[test]
    fn test_walks_from_current_slot_and_skips_dead() {
        let mut enc = encounter();
        enc.advance();
        enc.advance();
        enc.combatant_mut("goblin_b").unwrap().take_damage(7, false);
        let before = serde_json::to_value(&enc).unwrap();

        let decisions = decide_monster_actions(&enc, 5);
        let actors: Vec<_> = decisions.iter().map(|d| d.actor_id.as_str()).collect();
        assert_eq!(actors, vec!["ooze", "goblin_a"]);
        assert_eq!(serde_json::to_value(&enc).unwrap(), before);
    }

    #[test]
    fn test_no_targets_means_pass() {
        let mut enc = encounter();
        enc.combatant_mut("fighter").unwrap().take_damage(20, false);
        enc.combatant_mut("wizard").unwrap().take_damage(8, false);
        let decisions = decide_monster_actions(&enc, 5);
        assert!(decisions.iter().all(|d| d.action == ActionType::Pass));
    }
}
