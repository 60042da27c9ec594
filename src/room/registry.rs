//! Room lookup

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use regex::Regex;
use tracing::info;

use super::{RoomError, RoomHandle, RoomSettings};
use crate::narrator::NarratorClient;

static ROOM_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("room id regex compiles")
});

/// Room ids are 1-64 characters of letters, digits, `_` and `-`
pub fn validate_room_id(room_id: &str) -> Result<(), RoomError> {
    if ROOM_ID_RE.is_match(room_id) {
        Ok(())
    } else {
        Err(RoomError::InvalidRoomId(room_id.to_string()))
    }
}

/// All rooms of this server. Ending an encounter does not close its room;
/// only `close` does.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, RoomHandle>>,
    settings: RoomSettings,
    narrator: Arc<NarratorClient>,
}

impl RoomRegistry {
    pub fn new(settings: RoomSettings, narrator: Arc<NarratorClient>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            settings,
            narrator,
        }
    }

    pub fn get(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.read().get(room_id).cloned()
    }

    /// Get a room, spawning its actor on first use
    pub fn get_or_create(&self, room_id: &str) -> Result<RoomHandle, RoomError> {
        if let Some(handle) = self.get(room_id) {
            return Ok(handle);
        }
        validate_room_id(room_id)?;
        let handle = self
            .rooms
            .write()
            .entry(room_id.to_string())
            .or_insert_with(|| {
                RoomHandle::spawn(room_id, self.settings.clone(), self.narrator.clone())
            })
            .clone();
        Ok(handle)
    }

    /// Forget a room. Its actor stops, cancelling any pending monster turn,
    /// once the last outstanding handle is dropped.
    pub fn close(&self, room_id: &str) -> bool {
        let removed = self.rooms.write().remove(room_id).is_some();
        if removed {
            info!(room = %room_id, "room closed by registry");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.rooms.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.read().is_empty()
    }
}
