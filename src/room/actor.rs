//! Room actor and its handle

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use super::{RoomError, RoomSettings};
use crate::combat::{
    decide_monster_actions, ActionRequest, ActionType, CombatError, CombatEvent, CombatantSeed,
    EndReason, Encounter, EnvironmentFeature, MonsterDecision,
};
use crate::narrator::NarratorClient;
use crate::timers::CallOut;

type Reply<T> = oneshot::Sender<Result<T, CombatError>>;

pub(super) enum RoomCommand {
    Start {
        seeds: Vec<CombatantSeed>,
        reply: Reply<Encounter>,
    },
    Submit {
        request: ActionRequest,
        reply: Reply<()>,
    },
    Query {
        reply: oneshot::Sender<Option<Encounter>>,
    },
    SetEnvironment {
        features: Vec<EnvironmentFeature>,
        reply: Reply<()>,
    },
    End {
        reply: Reply<()>,
    },
    Advise {
        max: usize,
        reply: Reply<Vec<MonsterDecision>>,
    },
    /// Ask the NPC driver to run; replies whether it started a monster turn
    DriveNpc {
        reply: oneshot::Sender<bool>,
    },
    /// Delayed end of a monster turn
    Continue {
        generation: u64,
        actor_id: String,
    },
}

/// Cheap, cloneable access to a room actor
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: Arc<str>,
    tx: mpsc::Sender<RoomCommand>,
    events: broadcast::Sender<CombatEvent>,
}

impl RoomHandle {
    /// Spawn the actor for a room
    pub fn spawn(room_id: &str, settings: RoomSettings, narrator: Arc<NarratorClient>) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let (events, _) = broadcast::channel(settings.event_buffer.max(1));
        let rng = match settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let actor = RoomActor {
            room_id: room_id.to_string(),
            encounter: None,
            settings,
            narrator,
            events: events.clone(),
            commands: tx.downgrade(),
            pending: None,
            generation: 0,
            rng,
        };
        tokio::spawn(actor.run(rx));

        Self {
            room_id: Arc::from(room_id),
            tx,
            events,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Receive every event the room emits from now on
    pub fn subscribe(&self) -> broadcast::Receiver<CombatEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| RoomError::Closed(self.room_id.to_string()))?;
        rx.await
            .map_err(|_| RoomError::Closed(self.room_id.to_string()))
    }

    /// Roll initiative and open an encounter
    pub async fn start(&self, seeds: Vec<CombatantSeed>) -> Result<Encounter, RoomError> {
        Ok(self
            .request(|reply| RoomCommand::Start { seeds, reply })
            .await??)
    }

    /// Apply a player's action request
    pub async fn submit(&self, request: ActionRequest) -> Result<(), RoomError> {
        Ok(self
            .request(|reply| RoomCommand::Submit { request, reply })
            .await??)
    }

    /// Current encounter, if one was ever started. Also nudges the NPC driver.
    pub async fn snapshot(&self) -> Result<Option<Encounter>, RoomError> {
        self.request(|reply| RoomCommand::Query { reply }).await
    }

    pub async fn set_environment(
        &self,
        features: Vec<EnvironmentFeature>,
    ) -> Result<(), RoomError> {
        Ok(self
            .request(|reply| RoomCommand::SetEnvironment { features, reply })
            .await??)
    }

    /// End the encounter
    pub async fn end(&self) -> Result<(), RoomError> {
        Ok(self.request(|reply| RoomCommand::End { reply }).await??)
    }

    /// Proposed actions for the monsters acting next
    pub async fn advise(&self, max: usize) -> Result<Vec<MonsterDecision>, RoomError> {
        Ok(self
            .request(|reply| RoomCommand::Advise { max, reply })
            .await??)
    }

    /// Run the NPC driver; false if it was already busy or no monster is up
    pub async fn drive_npc(&self) -> Result<bool, RoomError> {
        self.request(|reply| RoomCommand::DriveNpc { reply }).await
    }
}

pub(super) struct RoomActor {
    pub(super) room_id: String,
    pub(super) encounter: Option<Encounter>,
    pub(super) settings: RoomSettings,
    pub(super) narrator: Arc<NarratorClient>,
    pub(super) events: broadcast::Sender<CombatEvent>,
    /// Weak so the actor stops once every handle is gone
    pub(super) commands: mpsc::WeakSender<RoomCommand>,
    /// Scheduled end of the acting monster's turn; doubles as the driver's
    /// in-flight guard
    pub(super) pending: Option<CallOut>,
    pub(super) generation: u64,
    pub(super) rng: StdRng,
}

impl RoomActor {
    async fn run(mut self, mut rx: mpsc::Receiver<RoomCommand>) {
        info!(room = %self.room_id, "room opened");
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        info!(room = %self.room_id, "room closed");
    }

    fn handle(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Start { seeds, reply } => {
                let result = self.start(seeds);
                let started = result.is_ok();
                let _ = reply.send(result);
                if started {
                    self.drive();
                }
            }
            RoomCommand::Submit { request, reply } => {
                let result = self.submit(request);
                let accepted = result.is_ok();
                let _ = reply.send(result);
                if accepted {
                    self.drive();
                }
            }
            RoomCommand::Query { reply } => {
                let _ = reply.send(self.encounter.clone());
                self.drive();
            }
            RoomCommand::SetEnvironment { features, reply } => {
                let result = self.active_encounter().map(|enc| enc.set_environment(features));
                let _ = reply.send(result.map(|events| self.publish(events)));
            }
            RoomCommand::End { reply } => {
                let _ = reply.send(self.end());
            }
            RoomCommand::Advise { max, reply } => {
                let result = match &self.encounter {
                    Some(enc) if enc.is_active() => Ok(decide_monster_actions(enc, max)),
                    _ => Err(CombatError::NoActiveEncounter),
                };
                let _ = reply.send(result);
            }
            RoomCommand::DriveNpc { reply } => {
                let _ = reply.send(self.drive());
            }
            RoomCommand::Continue {
                generation,
                actor_id,
            } => self.resume(generation, &actor_id),
        }
    }

    pub(super) fn active_encounter(&mut self) -> Result<&mut Encounter, CombatError> {
        self.encounter
            .as_mut()
            .filter(|enc| enc.is_active())
            .ok_or(CombatError::NoActiveEncounter)
    }

    pub(super) fn publish(&self, events: Vec<CombatEvent>) {
        for event in events {
            debug!(room = %self.room_id, event = event.kind(), "event");
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }

    fn start(&mut self, seeds: Vec<CombatantSeed>) -> Result<Encounter, CombatError> {
        if self.encounter.as_ref().is_some_and(Encounter::is_active) {
            return Err(CombatError::InvalidPrecondition(
                "an encounter is already running in this room".to_string(),
            ));
        }
        let encounter = Encounter::start(seeds, &mut self.rng)?;
        info!(
            room = %self.room_id,
            encounter = %encounter.id,
            first = encounter.current_id().unwrap_or_default(),
            "combat started"
        );
        self.cancel_pending();
        self.publish(vec![CombatEvent::update(&encounter)]);
        self.encounter = Some(encounter.clone());
        Ok(encounter)
    }

    fn submit(&mut self, request: ActionRequest) -> Result<(), CombatError> {
        let action = request.action_type();
        let actor = request.actor_id().to_string();
        let enc = self
            .encounter
            .as_mut()
            .filter(|enc| enc.is_active())
            .ok_or(CombatError::NoActiveEncounter)?;
        // The driver owns a monster's turn until its continuation runs
        let driver_turn = self.pending.is_some()
            && action != ActionType::OpportunityAttack
            && enc.current().is_some_and(|c| c.is_monster() && c.id == actor);
        if driver_turn {
            return Err(CombatError::precondition(format!("{}'s turn is being resolved", actor)));
        }
        let events = enc.submit(request, &mut self.rng)?;
        let still_active = enc.is_active();
        debug!(room = %self.room_id, actor = %actor, ?action, "action applied");
        self.publish(events);
        if !still_active {
            self.cancel_pending();
        }
        Ok(())
    }

    fn end(&mut self) -> Result<(), CombatError> {
        let enc = self.active_encounter()?;
        let mut events = enc.end(EndReason::Ended);
        events.push(CombatEvent::update(enc));
        self.cancel_pending();
        self.publish(events);
        Ok(())
    }

    pub(super) fn cancel_pending(&mut self) {
        if let Some(call_out) = self.pending.take() {
            call_out.cancel();
        }
    }
}
