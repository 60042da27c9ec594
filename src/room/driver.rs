//! NPC turn driver
//!
//! Whenever a monster is up the driver picks a target, resolves the attack,
//! publishes the result and schedules the end of the turn after the
//! presentation delay. While that continuation is pending the driver is
//! busy and further drive requests are no-ops. A monster turn that cannot be
//! resolved is narrated generically and skipped so the room never stalls.

use tracing::{debug, info, warn};

use super::actor::{RoomActor, RoomCommand};
use crate::combat::{select_target, ActionType, CombatEvent, Encounter, Strike};
use crate::narrator::templates;
use crate::timers::CallOut;

impl RoomActor {
    /// Run the driver. Returns true if a monster turn was taken.
    pub(super) fn drive(&mut self) -> bool {
        if self.pending.is_some() {
            debug!(room = %self.room_id, "driver busy, ignoring drive request");
            return false;
        }

        loop {
            let Some(enc) = self.encounter.as_mut().filter(|enc| enc.is_active()) else {
                return false;
            };
            let Some(current) = enc.current() else {
                return false;
            };
            let (actor_id, name) = (current.id.clone(), current.name.clone());

            let state = (current.is_player(), current.is_conscious(), current.is_dead());
            let skip_reason = match state {
                (true, _, false) => return false,
                (true, _, true) => "dead",
                (false, false, _) => "defeated",
                (false, true, _) => return self.monster_turn(&actor_id, &name),
            };

            debug!(room = %self.room_id, actor = %actor_id, skip_reason, "skipping turn");
            let mut events = enc.skip_current(skip_reason);
            events.extend(enc.conclude_if_over());
            events.push(CombatEvent::update(enc));
            self.publish(events);
        }
    }

    fn monster_turn(&mut self, actor_id: &str, name: &str) -> bool {
        let targeting = self.settings.targeting;
        let Some(enc) = self.encounter.as_mut() else {
            return false;
        };

        let Some(target_id) = select_target(&enc.order, &enc.threat, targeting, &mut self.rng)
        else {
            info!(room = %self.room_id, actor = %actor_id, "monster has no target");
            let mut events = vec![CombatEvent::Narration {
                actor_id: Some(actor_id.to_string()),
                text: templates::idle_line(name),
                fallback: true,
            }];
            events.extend(enc.skip_current("no target"));
            events.extend(enc.conclude_if_over());
            events.push(CombatEvent::update(enc));
            self.publish(events);
            self.drive();
            return true;
        };

        let strike = Strike {
            actor_id: actor_id.to_string(),
            target_id,
            attack_bonus: None,
            damage: None,
            roll_override: None,
        };

        match enc.resolve_strike(strike, ActionType::Attack, &mut self.rng) {
            Ok(mut events) => {
                let line = describe(enc, &events);
                events.extend(enc.conclude_if_over());
                let ended = !enc.is_active();
                events.push(CombatEvent::update(enc));

                if let Some(line) = line {
                    if let Some(narration) = self.narrate(actor_id, line) {
                        events.insert(1, narration);
                    }
                }
                self.publish(events);
                if !ended {
                    self.schedule_continuation(actor_id);
                }
            }
            Err(e) => {
                warn!(
                    room = %self.room_id,
                    actor = %actor_id,
                    error = %e,
                    "monster turn failed, forcing turn end"
                );
                let mut events = vec![CombatEvent::Narration {
                    actor_id: Some(actor_id.to_string()),
                    text: templates::fault_line(name),
                    fallback: true,
                }];
                events.extend(enc.skip_current("monster turn failed"));
                events.extend(enc.conclude_if_over());
                events.push(CombatEvent::update(enc));
                self.publish(events);
                self.drive();
            }
        }
        true
    }

    /// Templated narration right away, or None if the narrative service will
    /// publish it once it answers
    fn narrate(&self, actor_id: &str, line: String) -> Option<CombatEvent> {
        if !self.narrator.is_configured() {
            return Some(CombatEvent::Narration {
                actor_id: Some(actor_id.to_string()),
                text: line,
                fallback: true,
            });
        }

        let narrator = self.narrator.clone();
        let events = self.events.clone();
        let room_id = self.room_id.clone();
        let actor_id = actor_id.to_string();
        tokio::spawn(async move {
            let (text, fallback) = narrator.narrate_or(&room_id, &line, line.clone()).await;
            let _ = events.send(CombatEvent::Narration {
                actor_id: Some(actor_id),
                text,
                fallback,
            });
        });
        None
    }

    fn schedule_continuation(&mut self, actor_id: &str) {
        let Some(tx) = self.commands.upgrade() else {
            return;
        };
        self.generation += 1;
        let generation = self.generation;
        self.pending = Some(CallOut::schedule(
            generation,
            self.settings.npc_turn_delay,
            tx,
            RoomCommand::Continue {
                generation,
                actor_id: actor_id.to_string(),
            },
        ));
    }

    /// The presentation delay is over: end the monster's turn and keep going
    pub(super) fn resume(&mut self, generation: u64, actor_id: &str) {
        match &self.pending {
            Some(call_out) if call_out.generation == generation => {}
            _ => {
                debug!(room = %self.room_id, generation, "stale continuation ignored");
                return;
            }
        }
        self.pending = None;

        if let Some(enc) = self.encounter.as_mut().filter(|enc| enc.is_active()) {
            if enc.current_id() == Some(actor_id) {
                let mut events = enc.finish_turn(actor_id);
                events.push(CombatEvent::update(enc));
                self.publish(events);
            } else {
                warn!(
                    room = %self.room_id,
                    actor = %actor_id,
                    current = enc.current_id().unwrap_or_default(),
                    "continuation for a combatant who is no longer up"
                );
            }
        }
        self.drive();
    }
}

/// Plain-language line for the attack in `events`
fn describe(enc: &Encounter, events: &[CombatEvent]) -> Option<String> {
    events.iter().find_map(|event| match event {
        CombatEvent::CombatResult {
            attacker_id,
            target_id,
            resolution,
            damage,
            ..
        } => {
            let name = |id: &str| {
                enc.combatant(id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| id.to_string())
            };
            Some(templates::attack_line(
                &name(attacker_id),
                &name(target_id),
                resolution,
                damage,
            ))
        }
        _ => None,
    })
}
