//! Combatant state
//!
//! Tracks a single participant of an encounter:
//! - Hit points, temporary hit points and armor class
//! - Status effects
//! - Life state and death-save counters for player characters

use serde::{Deserialize, Serialize};

use super::death::{self, DeathSaveOutcome, DeathSaves};
use super::effects::{EffectSet, EffectType};

/// Who decides a combatant's actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Controller {
    Player,
    Monster,
}

/// Attack used by a monster on its own turns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackProfile {
    pub attack_bonus: i32,
    /// Dice notation, e.g. "1d6+2"
    pub damage: String,
}

/// Whether a combatant is still standing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LifeState {
    Conscious,
    Unconscious { stable: bool },
    Dead,
}

/// Input record supplied by the encounter-setup collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantSeed {
    pub id: String,
    pub name: String,
    pub controller: Controller,
    pub armor_class: i32,
    pub max_hp: i32,
    /// Current HP if the character enters combat wounded
    #[serde(default)]
    pub current_hp: Option<i32>,
    #[serde(default)]
    pub temporary_hp: Option<i32>,
    #[serde(default)]
    pub initiative_modifier: i32,
    #[serde(default)]
    pub attack: Option<AttackProfile>,
}

/// A participant in an encounter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: String,
    pub name: String,
    pub controller: Controller,
    /// Rolled initiative total
    pub initiative: i32,
    pub initiative_modifier: i32,
    pub armor_class: i32,
    pub current_hp: i32,
    pub max_hp: i32,
    pub temporary_hp: i32,
    pub effects: EffectSet,
    pub death_saves: DeathSaves,
    pub life: LifeState,
    pub attack: Option<AttackProfile>,
}

/// What a single damage application did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DamageReport {
    pub absorbed_by_temp: i32,
    pub hp_lost: i32,
    pub hp_after: i32,
    /// Dropped from positive HP to 0 with this hit
    pub dropped: bool,
    /// Became dead with this hit
    pub killed: bool,
    /// Death-save consequence for a player already at 0 HP
    pub death: Option<DeathSaveOutcome>,
}

impl Combatant {
    /// Build a combatant from a seed and its rolled initiative
    pub fn from_seed(seed: CombatantSeed, initiative: i32) -> Self {
        let max_hp = seed.max_hp.max(1);
        let current_hp = seed.current_hp.unwrap_or(max_hp).clamp(0, max_hp);
        let life = match (current_hp, seed.controller) {
            (hp, _) if hp > 0 => LifeState::Conscious,
            (_, Controller::Player) => LifeState::Unconscious { stable: true },
            (_, Controller::Monster) => LifeState::Dead,
        };

        let mut combatant = Self {
            id: seed.id,
            name: seed.name,
            controller: seed.controller,
            initiative,
            initiative_modifier: seed.initiative_modifier,
            armor_class: seed.armor_class,
            current_hp,
            max_hp,
            temporary_hp: 0,
            effects: EffectSet::new(),
            death_saves: DeathSaves::default(),
            life,
            attack: seed.attack,
        };
        if let Some(temp) = seed.temporary_hp {
            combatant.grant_temporary_hp(temp);
        }
        combatant
    }

    pub fn is_player(&self) -> bool {
        self.controller == Controller::Player
    }

    pub fn is_monster(&self) -> bool {
        self.controller == Controller::Monster
    }

    pub fn is_conscious(&self) -> bool {
        self.life == LifeState::Conscious
    }

    pub fn is_dead(&self) -> bool {
        self.life == LifeState::Dead
    }

    /// Still counts towards keeping the encounter running
    pub fn in_the_fight(&self) -> bool {
        self.current_hp > 0 || (self.death_saves.failures < 3 && !self.is_dead())
    }

    pub fn reaction_available(&self) -> bool {
        !self.effects.has(EffectType::ReactionSpent)
    }

    pub fn has_effect(&self, effect_type: EffectType) -> bool {
        self.effects.has(effect_type)
    }

    /// Temporary HP does not stack; the larger pool wins.
    pub fn grant_temporary_hp(&mut self, amount: i32) {
        self.temporary_hp = self.temporary_hp.max(amount.max(0));
    }

    /// Heal (cannot exceed max_hp); wakes an unconscious player
    pub fn heal(&mut self, amount: i32) -> i32 {
        if amount <= 0 || self.is_dead() {
            return 0;
        }
        let actual = amount.min(self.max_hp - self.current_hp);
        self.current_hp += actual;
        if self.current_hp > 0 && matches!(self.life, LifeState::Unconscious { .. }) {
            self.life = LifeState::Conscious;
            self.death_saves.reset();
        }
        actual
    }

    /// Apply damage: temporary HP first, then current HP, floored at 0
    pub fn take_damage(&mut self, amount: i32, critical: bool) -> DamageReport {
        let mut report = DamageReport {
            hp_after: self.current_hp,
            ..DamageReport::default()
        };
        if amount <= 0 || self.is_dead() {
            return report;
        }

        let absorbed = amount.min(self.temporary_hp);
        self.temporary_hp -= absorbed;
        report.absorbed_by_temp = absorbed;
        let remaining = amount - absorbed;
        if remaining == 0 {
            return report;
        }

        if self.current_hp == 0 {
            // Already down: no HP left to lose, the hit lands on the death saves
            if self.is_player() {
                let outcome = death::damage_while_down(self, remaining, critical);
                report.killed = outcome == DeathSaveOutcome::Dead;
                report.death = Some(outcome);
            }
            return report;
        }

        let before = self.current_hp;
        self.current_hp = (before - remaining).max(0);
        report.hp_lost = before - self.current_hp;
        report.hp_after = self.current_hp;

        if self.current_hp == 0 {
            report.dropped = true;
            match self.controller {
                Controller::Monster => {
                    self.life = LifeState::Dead;
                    report.killed = true;
                }
                Controller::Player => {
                    self.death_saves.reset();
                    // Massive damage: overflow of at least max HP kills outright
                    if remaining - before >= self.max_hp {
                        self.death_saves.failures = 3;
                        self.life = LifeState::Dead;
                        report.killed = true;
                    } else {
                        self.life = LifeState::Unconscious { stable: false };
                    }
                }
            }
        }
        report
    }
}
