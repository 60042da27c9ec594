//! Combat rooms
//!
//! Each room runs one actor task that owns the room's encounter. Every
//! mutation, player input and NPC continuation alike, is a command on the
//! actor's queue, so handlers never interleave inside a room. Events fan out
//! to viewers over a broadcast channel.

mod actor;
mod driver;
mod registry;

use std::time::Duration;

use thiserror::Error;

use crate::combat::{CombatError, TargetingPolicy};

pub use actor::RoomHandle;
pub use registry::{validate_room_id, RoomRegistry};

#[derive(Debug, Error)]
pub enum RoomError {
    #[error(transparent)]
    Combat(#[from] CombatError),

    #[error("room {0} is closed")]
    Closed(String),

    #[error("invalid room id: {0:?}")]
    InvalidRoomId(String),
}

impl RoomError {
    /// Stable machine-readable code for the wire
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::Combat(e) => e.code(),
            RoomError::Closed(_) => "room_closed",
            RoomError::InvalidRoomId(_) => "invalid_room_id",
        }
    }
}

/// Per-room behaviour
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Pause between an NPC's narrated result and its turn ending
    pub npc_turn_delay: Duration,
    pub targeting: TargetingPolicy,
    pub event_buffer: usize,
    /// Fixed RNG seed; None draws from the OS
    pub rng_seed: Option<u64>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            npc_turn_delay: Duration::from_millis(1500),
            targeting: TargetingPolicy::Threat,
            event_buffer: 256,
            rng_seed: None,
        }
    }
}
