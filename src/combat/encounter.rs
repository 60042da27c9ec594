//! Encounter state and the turn state machine
//!
//! An encounter owns the initiative order, the turn pointer, the action log,
//! pending holds and the threat table. Requests are validated in full before
//! anything is mutated, so a rejected request leaves the encounter untouched.
//!
//! Held turns: a combatant may hold until another combatant acts or until the
//! end of the round. When the hold fires the holder is pushed onto the
//! interrupt queue and acts before the turn pointer moves again.

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::action::{
    ActionRecord, ActionRequest, ActionType, BonusActionType, HoldDirective, HoldTrigger, Strike,
};
use super::attack::{resolve_attack, threat_for};
use super::combatant::{Combatant, CombatantSeed};
use super::death::{self, DeathSaveOutcome};
use super::dice::{parse_dice, roll_d20, Advantage, DiceRoll};
use super::effects::{EffectType, Expiry};
use super::error::CombatError;
use super::events::{CombatEvent, EndReason};
use super::initiative::{check_bonus, roll_initiative};
use super::threat::ThreatTable;

/// Extra damage a raging attacker adds on a hit
pub const RAGE_DAMAGE_BONUS: i32 = 2;

/// Healing dice for a heal-self bonus action when none are given
pub const DEFAULT_SELF_HEAL: &str = "1d8+2";

/// A notable feature of the battlefield
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentFeature {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// One continuous combat session in a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encounter {
    pub id: Uuid,
    pub active: bool,
    /// Starts at 1
    pub round: u32,
    pub turn_index: usize,
    pub order: Vec<Combatant>,
    pub action_log: Vec<ActionRecord>,
    pub holds: Vec<HoldDirective>,
    /// Holders whose trigger fired, acting ahead of the turn pointer
    pub interrupts: VecDeque<String>,
    pub threat: ThreatTable,
    pub environment: Vec<EnvironmentFeature>,
}

impl Encounter {
    /// Roll initiative for the seeds and open round 1
    pub fn start<R: Rng + ?Sized>(
        seeds: Vec<CombatantSeed>,
        rng: &mut R,
    ) -> Result<Self, CombatError> {
        let order = roll_initiative(seeds, rng)?;
        Ok(Self::from_order(order))
    }

    /// Open an encounter with an already sorted order
    pub fn from_order(order: Vec<Combatant>) -> Self {
        let encounter = Self {
            id: Uuid::new_v4(),
            active: !order.is_empty(),
            round: 1,
            turn_index: 0,
            order,
            action_log: Vec::new(),
            holds: Vec::new(),
            interrupts: VecDeque::new(),
            threat: ThreatTable::new(),
            environment: Vec::new(),
        };
        info!(
            encounter = %encounter.id,
            combatants = encounter.order.len(),
            "encounter started"
        );
        encounter
    }

    pub fn is_active(&self) -> bool {
        self.active && !self.order.is_empty()
    }

    /// The combatant whose turn it is
    pub fn current(&self) -> Option<&Combatant> {
        if !self.is_active() {
            return None;
        }
        match self.interrupts.front() {
            Some(holder) => self.combatant(holder),
            None => self.order.get(self.turn_index),
        }
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current().map(|c| c.id.as_str())
    }

    pub fn combatant(&self, id: &str) -> Option<&Combatant> {
        self.order.iter().find(|c| c.id == id)
    }

    pub fn combatant_mut(&mut self, id: &str) -> Option<&mut Combatant> {
        self.order.iter_mut().find(|c| c.id == id)
    }

    fn index_of(&self, id: &str) -> Result<usize, CombatError> {
        self.order
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| CombatError::TargetNotFound(id.to_string()))
    }

    fn ensure_active(&self) -> Result<(), CombatError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(CombatError::NoActiveEncounter)
        }
    }

    /// Reject unless `actor_id` is the combatant whose turn it is
    pub fn ensure_turn(&self, actor_id: &str) -> Result<(), CombatError> {
        self.ensure_active()?;
        self.index_of(actor_id)?;
        match self.current_id() {
            Some(current) if current == actor_id => Ok(()),
            current => Err(CombatError::NotYourTurn {
                actor: actor_id.to_string(),
                current: current.unwrap_or_default().to_string(),
            }),
        }
    }

    fn ensure_conscious(&self, idx: usize) -> Result<(), CombatError> {
        let c = &self.order[idx];
        if c.is_conscious() {
            Ok(())
        } else {
            Err(CombatError::precondition(format!(
                "{} cannot act while at 0 HP",
                c.name
            )))
        }
    }

    fn log(&mut self, record: ActionRecord) {
        debug!(
            actor = %record.actor_id,
            action = ?record.action,
            round = record.round,
            outcome = record.outcome.as_deref().unwrap_or(""),
            "action logged"
        );
        self.action_log.push(record);
    }

    /// Move the turn pointer one slot. Wrapping around starts a new round and
    /// expires round-scoped effects.
    pub fn advance(&mut self) {
        if !self.is_active() {
            return;
        }
        self.turn_index = (self.turn_index + 1) % self.order.len();
        if self.turn_index == 0 {
            self.round += 1;
            for combatant in &mut self.order {
                combatant.effects.expire(Expiry::RoundStart);
            }
            debug!(encounter = %self.id, round = self.round, "new round");
        }
    }

    /// Fire every hold waiting on `just_acted`; the holders act next, in the
    /// order the holds were placed.
    pub fn process_trigger(&mut self, just_acted: &str) -> Vec<String> {
        let mut fired = Vec::new();
        self.holds.retain(|hold| match &hold.trigger {
            HoldTrigger::OnActorActs { actor_id } if actor_id == just_acted => {
                fired.push(hold.holder_id.clone());
                false
            }
            _ => true,
        });
        self.interrupts.extend(fired.iter().cloned());
        fired
    }

    /// Finish `actor_id`'s turn: leave the interrupt queue if acting from a
    /// hold, fire holds waiting on this actor, and otherwise move on.
    fn end_turn(&mut self, actor_id: &str) -> Vec<CombatEvent> {
        let mut events = Vec::new();
        if !self.is_active() {
            return events;
        }
        if self.interrupts.front().map(String::as_str) == Some(actor_id) {
            self.interrupts.pop_front();
        }
        for holder in self.process_trigger(actor_id) {
            info!(holder = %holder, trigger = %actor_id, "held turn triggered");
            events.push(CombatEvent::HeldTriggered {
                holder_id: holder,
                trigger_actor_id: Some(actor_id.to_string()),
            });
        }
        self.step(&mut events);
        events
    }

    fn step(&mut self, events: &mut Vec<CombatEvent>) {
        if !self.interrupts.is_empty() {
            return;
        }
        let last_slot = self.turn_index + 1 == self.order.len();
        if last_slot && !self.holds.is_empty() {
            // Unfired holds resolve before the round wraps
            for hold in std::mem::take(&mut self.holds) {
                info!(holder = %hold.holder_id, "held turn fires at end of round");
                events.push(CombatEvent::HeldTriggered {
                    holder_id: hold.holder_id.clone(),
                    trigger_actor_id: None,
                });
                self.interrupts.push_back(hold.holder_id);
            }
            return;
        }
        self.advance();
    }

    /// End the current turn on behalf of the combat core (defeated or broken
    /// combatants), logging it as a pass.
    pub fn skip_current(&mut self, reason: &str) -> Vec<CombatEvent> {
        let Some(current) = self.current_id().map(str::to_string) else {
            return Vec::new();
        };
        let record = ActionRecord::new(&current, ActionType::Pass, self.round).with_outcome(reason);
        self.log(record);
        let mut events = vec![CombatEvent::Pass {
            actor_id: current.clone(),
            round: self.round,
        }];
        events.extend(self.end_turn(&current));
        events
    }

    /// Finish a turn whose action was already resolved
    pub fn finish_turn(&mut self, actor_id: &str) -> Vec<CombatEvent> {
        let mut events = self.end_turn(actor_id);
        events.extend(self.conclude_if_over());
        events
    }

    /// Apply one action request
    pub fn submit<R: Rng + ?Sized>(
        &mut self,
        request: ActionRequest,
        rng: &mut R,
    ) -> Result<Vec<CombatEvent>, CombatError> {
        self.ensure_active()?;

        let mut events = match request {
            ActionRequest::Attack(strike) => self.take_strike(strike, ActionType::Attack, rng)?,
            ActionRequest::Spell(strike) => self.take_strike(strike, ActionType::Spell, rng)?,
            ActionRequest::OpportunityAttack(strike) => self.opportunity_attack(strike, rng)?,
            ActionRequest::Move {
                actor_id,
                description,
            } => self.move_action(&actor_id, description)?,
            ActionRequest::Pass { actor_id } => self.pass(&actor_id)?,
            ActionRequest::Hold { actor_id, trigger } => self.hold(&actor_id, trigger)?,
            ActionRequest::BonusAction { actor_id, bonus } => {
                self.bonus_action(&actor_id, bonus, rng)?
            }
            ActionRequest::DeathSave {
                actor_id,
                roll_override,
            } => self.death_save(&actor_id, roll_override, rng)?,
        };

        events.extend(self.conclude_if_over());
        events.push(CombatEvent::update(self));
        Ok(events)
    }

    /// Pass the turn
    pub fn pass(&mut self, actor_id: &str) -> Result<Vec<CombatEvent>, CombatError> {
        self.ensure_turn(actor_id)?;
        self.log(ActionRecord::new(actor_id, ActionType::Pass, self.round));
        let mut events = vec![CombatEvent::Pass {
            actor_id: actor_id.to_string(),
            round: self.round,
        }];
        events.extend(self.end_turn(actor_id));
        Ok(events)
    }

    /// Defer this turn until the trigger fires
    pub fn hold(
        &mut self,
        actor_id: &str,
        trigger: HoldTrigger,
    ) -> Result<Vec<CombatEvent>, CombatError> {
        self.ensure_turn(actor_id)?;
        if self.interrupts.front().map(String::as_str) == Some(actor_id) {
            return Err(CombatError::precondition(
                "a held turn cannot be held again",
            ));
        }
        if let HoldTrigger::OnActorActs { actor_id: watched } = &trigger {
            self.index_of(watched)?;
            if watched == actor_id {
                return Err(CombatError::precondition("cannot hold for your own action"));
            }
        }

        let mut record = ActionRecord::new(actor_id, ActionType::Hold, self.round);
        if let HoldTrigger::OnActorActs { actor_id: watched } = &trigger {
            record = record.with_target(watched);
        }
        self.log(record);
        self.holds.push(HoldDirective {
            holder_id: actor_id.to_string(),
            trigger: trigger.clone(),
        });

        let mut events = vec![CombatEvent::Hold {
            actor_id: actor_id.to_string(),
            trigger,
        }];
        self.step(&mut events);
        Ok(events)
    }

    fn move_action(
        &mut self,
        actor_id: &str,
        description: Option<String>,
    ) -> Result<Vec<CombatEvent>, CombatError> {
        self.ensure_turn(actor_id)?;
        let idx = self.index_of(actor_id)?;
        self.ensure_conscious(idx)?;

        let mut record = ActionRecord::new(actor_id, ActionType::Move, self.round);
        if let Some(desc) = &description {
            record = record.with_outcome(desc.clone());
        }
        self.log(record);
        Ok(vec![CombatEvent::Move {
            actor_id: actor_id.to_string(),
            description,
        }])
    }

    fn bonus_action<R: Rng + ?Sized>(
        &mut self,
        actor_id: &str,
        bonus: BonusActionType,
        rng: &mut R,
    ) -> Result<Vec<CombatEvent>, CombatError> {
        self.ensure_turn(actor_id)?;
        let idx = self.index_of(actor_id)?;
        self.ensure_conscious(idx)?;

        let heal_dice = match &bonus {
            BonusActionType::HealSelf { dice } => {
                Some(parse_dice(dice.as_deref().unwrap_or(DEFAULT_SELF_HEAL))?)
            }
            _ => None,
        };

        let round = self.round;
        let combatant = &mut self.order[idx];
        let healed = match &bonus {
            BonusActionType::HealSelf { .. } => {
                let amount = heal_dice.map(|d| d.roll(rng).total).unwrap_or(0);
                Some(combatant.heal(amount))
            }
            BonusActionType::Rage => {
                combatant.effects.apply(EffectType::Raging, round);
                None
            }
            BonusActionType::Dodge => {
                combatant.effects.apply(EffectType::Dodging, round);
                None
            }
            BonusActionType::Disengage => {
                combatant.effects.apply(EffectType::Disengaged, round);
                None
            }
            BonusActionType::Dash => {
                combatant.effects.apply(EffectType::Dashing, round);
                None
            }
            BonusActionType::Hide => {
                combatant.effects.apply(EffectType::Hidden, round);
                None
            }
        };

        let mut record = ActionRecord::new(actor_id, ActionType::BonusAction, round)
            .with_outcome(bonus.name());
        if let Some(hp) = healed {
            record = record.with_outcome(format!("{} +{} HP", bonus.name(), hp));
        }
        self.log(record);

        Ok(vec![CombatEvent::BonusAction {
            actor_id: actor_id.to_string(),
            bonus,
            healed,
        }])
    }

    fn death_save<R: Rng + ?Sized>(
        &mut self,
        actor_id: &str,
        roll_override: Option<u32>,
        rng: &mut R,
    ) -> Result<Vec<CombatEvent>, CombatError> {
        self.ensure_turn(actor_id)?;
        let idx = self.index_of(actor_id)?;
        death::ensure_can_roll(&self.order[idx])?;
        let roll = match roll_override {
            Some(r) => validate_d20(r)?,
            None => roll_d20(rng),
        };

        let round = self.round;
        let combatant = &mut self.order[idx];
        let outcome = death::resolve_death_save(combatant, roll)?;
        let saves = combatant.death_saves;
        let name = combatant.name.clone();
        let controller = combatant.controller;

        self.log(
            ActionRecord::new(actor_id, ActionType::DeathSave, round)
                .with_outcome(format!("rolled {}: {:?}", roll, outcome)),
        );
        info!(actor = %actor_id, roll, ?outcome, "death save");

        let mut events = vec![CombatEvent::DeathSave {
            actor_id: actor_id.to_string(),
            roll: Some(roll),
            outcome,
            successes: saves.successes,
            failures: saves.failures,
        }];
        if outcome == DeathSaveOutcome::Dead {
            events.push(CombatEvent::Defeated {
                combatant_id: actor_id.to_string(),
                name,
                controller,
            });
        }
        events.extend(self.end_turn(actor_id));
        Ok(events)
    }

    fn take_strike<R: Rng + ?Sized>(
        &mut self,
        strike: Strike,
        kind: ActionType,
        rng: &mut R,
    ) -> Result<Vec<CombatEvent>, CombatError> {
        let actor_id = strike.actor_id.clone();
        let mut events = self.resolve_strike(strike, kind, rng)?;
        events.extend(self.end_turn(&actor_id));
        Ok(events)
    }

    /// Resolve an on-turn attack or spell without ending the turn
    pub fn resolve_strike<R: Rng + ?Sized>(
        &mut self,
        strike: Strike,
        kind: ActionType,
        rng: &mut R,
    ) -> Result<Vec<CombatEvent>, CombatError> {
        self.ensure_turn(&strike.actor_id)?;
        let (attacker, target, bonus, dice) = self.validate_strike(&strike)?;
        let roll_override = strike.roll_override.map(validate_d20).transpose()?;
        Ok(self.apply_strike(attacker, target, bonus, &dice, roll_override, kind, rng))
    }

    fn opportunity_attack<R: Rng + ?Sized>(
        &mut self,
        strike: Strike,
        rng: &mut R,
    ) -> Result<Vec<CombatEvent>, CombatError> {
        let (attacker, target, bonus, dice) = self.validate_strike(&strike)?;
        if !self.order[attacker].reaction_available() {
            return Err(CombatError::ReactionAlreadyUsed(strike.actor_id));
        }
        if self.order[target].has_effect(EffectType::Disengaged) {
            return Err(CombatError::precondition(format!(
                "{} has disengaged and provokes no opportunity attacks",
                self.order[target].name
            )));
        }
        let roll_override = strike.roll_override.map(validate_d20).transpose()?;

        let round = self.round;
        self.order[attacker]
            .effects
            .apply(EffectType::ReactionSpent, round);
        Ok(self.apply_strike(
            attacker,
            target,
            bonus,
            &dice,
            roll_override,
            ActionType::OpportunityAttack,
            rng,
        ))
    }

    /// Checks shared by every attack-like request
    fn validate_strike(
        &self,
        strike: &Strike,
    ) -> Result<(usize, usize, i32, DiceRoll), CombatError> {
        let attacker = self.index_of(&strike.actor_id)?;
        let target = self.index_of(&strike.target_id)?;
        self.ensure_conscious(attacker)?;
        if attacker == target {
            return Err(CombatError::precondition("cannot attack yourself"));
        }
        if self.order[target].is_dead() {
            return Err(CombatError::precondition(format!(
                "{} is already dead",
                self.order[target].name
            )));
        }

        let profile = self.order[attacker].attack.as_ref();
        let bonus = strike
            .attack_bonus
            .or(profile.map(|p| p.attack_bonus))
            .ok_or_else(|| CombatError::precondition("attack bonus required"))
            .and_then(|bonus| check_bonus("attack bonus", bonus))?;
        let damage = strike
            .damage
            .as_deref()
            .or(profile.map(|p| p.damage.as_str()))
            .ok_or_else(|| CombatError::precondition("damage expression required"))?;
        let dice = parse_dice(damage)?;
        Ok((attacker, target, bonus, dice))
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_strike<R: Rng + ?Sized>(
        &mut self,
        attacker: usize,
        target: usize,
        bonus: i32,
        dice: &DiceRoll,
        roll_override: Option<u32>,
        kind: ActionType,
        rng: &mut R,
    ) -> Vec<CombatEvent> {
        let mut advantage = Advantage::Normal;
        if self.order[attacker].has_effect(EffectType::Hidden) {
            advantage = advantage.combine(Advantage::Advantage);
        }
        if self.order[target].has_effect(EffectType::Dodging) {
            advantage = advantage.combine(Advantage::Disadvantage);
        }

        let target_ac = self.order[target].armor_class;
        let mut resolution = resolve_attack(bonus, target_ac, dice, roll_override, advantage, rng);

        let attacker_id = self.order[attacker].id.clone();
        let raging = self.order[attacker].has_effect(EffectType::Raging);
        self.order[attacker].effects.expire(Expiry::OnAttack);
        if resolution.is_hit && raging {
            resolution.damage_total = resolution.damage_total.saturating_add(RAGE_DAMAGE_BONUS);
        }

        let report =
            self.order[target].take_damage(resolution.damage_total, resolution.is_critical);
        let threat = if resolution.is_hit {
            self.threat.add(&attacker_id, threat_for(&resolution))
        } else {
            self.threat.get(&attacker_id)
        };

        let target_id = self.order[target].id.clone();
        let outcome = match (resolution.is_hit, resolution.is_critical) {
            (false, _) => "miss".to_string(),
            (true, false) => format!("hit for {}", resolution.damage_total),
            (true, true) => format!("critical hit for {}", resolution.damage_total),
        };
        self.log(
            ActionRecord::new(&attacker_id, kind, self.round)
                .with_target(&target_id)
                .with_outcome(outcome),
        );

        let mut events = vec![CombatEvent::CombatResult {
            attacker_id,
            target_id: target_id.clone(),
            action: kind,
            resolution,
            damage: report,
            threat,
        }];

        let victim = &self.order[target];
        if let Some(outcome) = report.death {
            events.push(CombatEvent::DeathSave {
                actor_id: target_id.clone(),
                roll: None,
                outcome,
                successes: victim.death_saves.successes,
                failures: victim.death_saves.failures,
            });
        }
        if report.killed {
            info!(combatant = %target_id, "combatant defeated");
            events.push(CombatEvent::Defeated {
                combatant_id: target_id,
                name: victim.name.clone(),
                controller: victim.controller,
            });
        }
        events
    }

    /// Replace the battlefield features
    pub fn set_environment(&mut self, features: Vec<EnvironmentFeature>) -> Vec<CombatEvent> {
        self.environment = features;
        vec![
            CombatEvent::EnvironmentUpdate {
                features: self.environment.clone(),
            },
            CombatEvent::update(self),
        ]
    }

    /// True once no player character is still in the fight
    pub fn should_end(&self) -> bool {
        self.is_active()
            && !self
                .order
                .iter()
                .filter(|c| c.is_player())
                .any(Combatant::in_the_fight)
    }

    /// Force-end the encounter if the party has been defeated
    pub fn conclude_if_over(&mut self) -> Vec<CombatEvent> {
        if self.should_end() {
            self.end(EndReason::PartyDefeated)
        } else {
            Vec::new()
        }
    }

    /// Terminate the encounter
    pub fn end(&mut self, reason: EndReason) -> Vec<CombatEvent> {
        if !self.active {
            return Vec::new();
        }
        info!(encounter = %self.id, round = self.round, ?reason, "encounter ended");
        self.active = false;
        self.order.clear();
        self.holds.clear();
        self.interrupts.clear();
        self.turn_index = 0;
        vec![CombatEvent::CombatEnded { reason }]
    }
}

fn validate_d20(roll: u32) -> Result<u32, CombatError> {
    if (1..=20).contains(&roll) {
        Ok(roll)
    } else {
        Err(CombatError::precondition(format!(
            "d20 override must be between 1 and 20, got {}",
            roll
        )))
    }
}
