//! WebSocket handler for combat participants and viewers

use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::AppState;
use crate::combat::{
    ActionRequest, CombatEvent, CombatantSeed, Encounter, EnvironmentFeature, MonsterDecision,
};
use crate::room::{RoomError, RoomHandle};

/// A connected client
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub room_id: Option<String>,
    /// Combatant this connection may act for; None for GM or viewer
    pub participant_id: Option<String>,
}

/// Tracks every open WebSocket connection
#[derive(Debug, Default)]
pub struct ConnectionManager {
    sessions: RwLock<HashMap<String, Session>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, connection_id: &str) {
        self.sessions
            .write()
            .await
            .insert(connection_id.to_string(), Session::default());
    }

    pub async fn unregister(&self, connection_id: &str) {
        self.sessions.write().await.remove(connection_id);
    }

    pub async fn join(&self, connection_id: &str, room_id: &str, participant_id: Option<String>) {
        if let Some(session) = self.sessions.write().await.get_mut(connection_id) {
            session.room_id = Some(room_id.to_string());
            session.participant_id = participant_id;
        }
    }

    pub async fn session(&self, connection_id: &str) -> Option<Session> {
        self.sessions.read().await.get(connection_id).cloned()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Connections currently joined to a room
    pub async fn room_count(&self, room_id: &str) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.room_id.as_deref() == Some(room_id))
            .count()
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Welcome message on connect
    Welcome { connection_id: String },
    /// Joined a room; carries its encounter if one was started
    Joined {
        room_id: String,
        encounter: Option<Box<Encounter>>,
    },
    /// Room event
    Event { event: CombatEvent },
    /// Full state, sent on request or after falling behind
    Snapshot { encounter: Option<Box<Encounter>> },
    Advice { decisions: Vec<MonsterDecision> },
    Error { code: String, message: String },
    Pong,
}

impl ServerMessage {
    fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<RoomError> for ServerMessage {
    fn from(e: RoomError) -> Self {
        ServerMessage::error(e.code(), e.to_string())
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        room_id: String,
        #[serde(default)]
        participant_id: Option<String>,
    },
    StartCombat {
        seeds: Vec<CombatantSeed>,
    },
    Action {
        request: ActionRequest,
    },
    Query,
    SetEnvironment {
        features: Vec<EnvironmentFeature>,
    },
    EndCombat,
    Advise {
        #[serde(default = "default_advice_max")]
        max: usize,
    },
    /// Keepalive
    Ping,
}

fn default_advice_max() -> usize {
    4
}

/// Handle WebSocket upgrade
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection state
struct Connection {
    id: String,
    room: Option<RoomHandle>,
    events: Option<broadcast::Receiver<CombatEvent>>,
    participant_id: Option<String>,
}

async fn send(socket: &mut WebSocket, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to encode server message: {}", e);
            true
        }
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<CombatEvent>>,
) -> Result<CombatEvent, RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Handle an individual WebSocket connection
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut conn = Connection {
        id: uuid::Uuid::new_v4().to_string(),
        room: None,
        events: None,
        participant_id: None,
    };
    state.connections.register(&conn.id).await;
    info!("WebSocket connected: {}", conn.id);

    let welcome = ServerMessage::Welcome {
        connection_id: conn.id.clone(),
    };
    if send(&mut socket, &welcome).await {
        loop {
            tokio::select! {
                event = next_event(&mut conn.events) => {
                    let msg = match event {
                        Ok(event) => ServerMessage::Event { event },
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(connection = %conn.id, skipped, "viewer fell behind, resyncing");
                            resync(&conn).await
                        }
                        Err(RecvError::Closed) => {
                            conn.events = None;
                            continue;
                        }
                    };
                    if !send(&mut socket, &msg).await {
                        break;
                    }
                }
                result = socket.recv() => {
                    match result {
                        Some(Ok(Message::Text(text))) => {
                            let reply = match serde_json::from_str::<ClientMessage>(&text) {
                                Ok(msg) => handle_client_message(&state, &mut conn, msg).await,
                                Err(e) => Some(ServerMessage::error("bad_request", e.to_string())),
                            };
                            if let Some(reply) = reply {
                                if !send(&mut socket, &reply).await {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                        _ => {}
                    }
                }
            }
        }
    }

    // The room and its encounter outlive the connection
    state.connections.unregister(&conn.id).await;
    info!("WebSocket disconnected: {}", conn.id);
}

async fn resync(conn: &Connection) -> ServerMessage {
    match &conn.room {
        Some(room) => match room.snapshot().await {
            Ok(encounter) => ServerMessage::Snapshot {
                encounter: encounter.map(Box::new),
            },
            Err(e) => e.into(),
        },
        None => ServerMessage::Snapshot { encounter: None },
    }
}

/// Handle a message from the client; room events arrive separately
async fn handle_client_message(
    state: &AppState,
    conn: &mut Connection,
    msg: ClientMessage,
) -> Option<ServerMessage> {
    if let ClientMessage::Join {
        room_id,
        participant_id,
    } = msg
    {
        let room = match state.rooms.get_or_create(&room_id) {
            Ok(room) => room,
            Err(e) => return Some(e.into()),
        };
        conn.events = Some(room.subscribe());
        state
            .connections
            .join(&conn.id, &room_id, participant_id.clone())
            .await;
        info!(connection = %conn.id, room = %room_id, participant = ?participant_id, "joined room");
        conn.participant_id = participant_id;
        let encounter = room.snapshot().await;
        conn.room = Some(room);
        return Some(match encounter {
            Ok(encounter) => ServerMessage::Joined {
                room_id,
                encounter: encounter.map(Box::new),
            },
            Err(e) => e.into(),
        });
    }

    if matches!(msg, ClientMessage::Ping) {
        return Some(ServerMessage::Pong);
    }

    let Some(room) = conn.room.clone() else {
        return Some(ServerMessage::error("not_joined", "join a room first"));
    };

    let result = match msg {
        ClientMessage::StartCombat { seeds } => room.start(seeds).await.map(|_| ()),
        ClientMessage::Action { request } => {
            if let Some(participant) = &conn.participant_id {
                if request.actor_id() != participant {
                    return Some(ServerMessage::error(
                        "forbidden",
                        format!("{} cannot act for {}", participant, request.actor_id()),
                    ));
                }
            }
            debug!(connection = %conn.id, action = ?request.action_type(), "action submitted");
            room.submit(request).await
        }
        ClientMessage::Query => {
            return Some(match room.snapshot().await {
                Ok(encounter) => ServerMessage::Snapshot {
                    encounter: encounter.map(Box::new),
                },
                Err(e) => e.into(),
            });
        }
        ClientMessage::SetEnvironment { features } => room.set_environment(features).await,
        ClientMessage::EndCombat => room.end().await,
        ClientMessage::Advise { max } => {
            return Some(match room.advise(max).await {
                Ok(decisions) => ServerMessage::Advice { decisions },
                Err(e) => e.into(),
            });
        }
        ClientMessage::Join { .. } | ClientMessage::Ping => return None,
    };

    // Success is visible through the room's events
    result.err().map(ServerMessage::from)
}
