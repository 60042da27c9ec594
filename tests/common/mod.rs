//! Common test utilities - SkirmishTest harness for end-to-end testing

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use skirmish::{Config, Server};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// NPC presentation delay used by the test servers
pub const TEST_NPC_DELAY_MS: u64 = 50;

/// Test harness that spawns a real skirmish server on a random port
pub struct SkirmishTest {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
}

impl SkirmishTest {
    /// Start a new test server instance
    pub async fn start() -> Result<Self> {
        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let config = Config {
            bind_addr: addr,
            npc_turn_delay_ms: TEST_NPC_DELAY_MS,
            ..Config::default()
        };

        let server = Arc::new(Server::new(config)?);
        let server_clone = server.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            server,
            _handle: handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Connect to the WebSocket endpoint; consumes the welcome message
    pub async fn connect_ws(&self) -> Result<WsClient> {
        let (ws_stream, _) = connect_async(&self.ws_url()).await?;
        let (write, read) = ws_stream.split();
        let mut client = WsClient { write, read };
        let welcome = client.recv_json_timeout(Duration::from_secs(2)).await?;
        anyhow::ensure!(welcome["type"] == "welcome", "expected welcome, got {}", welcome);
        Ok(client)
    }

    /// Connect and join a room, optionally bound to one combatant
    pub async fn join(&self, room_id: &str, participant_id: Option<&str>) -> Result<WsClient> {
        let mut client = self.connect_ws().await?;
        client
            .send_json(json!({
                "type": "join",
                "room_id": room_id,
                "participant_id": participant_id,
            }))
            .await?;
        let joined = client.expect("joined").await?;
        anyhow::ensure!(joined["room_id"] == room_id, "joined wrong room: {}", joined);
        Ok(client)
    }

    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}

impl Drop for SkirmishTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}

/// Combatant seed as JSON
pub fn seed(
    id: &str,
    controller: &str,
    armor_class: i32,
    max_hp: i32,
    initiative_modifier: i32,
    attack: Option<(i32, &str)>,
) -> Value {
    let mut seed = json!({
        "id": id,
        "name": id,
        "controller": controller,
        "armor_class": armor_class,
        "max_hp": max_hp,
        "initiative_modifier": initiative_modifier,
    });
    if let Some((attack_bonus, damage)) = attack {
        seed["attack"] = json!({ "attack_bonus": attack_bonus, "damage": damage });
    }
    seed
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket client for testing
pub struct WsClient {
    write: futures_util::stream::SplitSink<WsStream, Message>,
    read: futures_util::stream::SplitStream<WsStream>,
}

impl WsClient {
    pub async fn send_json(&mut self, msg: Value) -> Result<()> {
        self.write.send(Message::Text(msg.to_string().into())).await?;
        Ok(())
    }

    /// Submit an action request
    pub async fn action(&mut self, request: Value) -> Result<()> {
        self.send_json(json!({ "type": "action", "request": request }))
            .await
    }

    /// Receive the next message as JSON
    pub async fn recv_json(&mut self) -> Result<Value> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(serde_json::from_str(&text)?);
                }
                Some(Ok(Message::Close(_))) | None => {
                    anyhow::bail!("WebSocket closed");
                }
                _ => continue,
            }
        }
    }

    /// Receive with timeout
    pub async fn recv_json_timeout(&mut self, timeout: Duration) -> Result<Value> {
        match tokio::time::timeout(timeout, self.recv_json()).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("Timeout waiting for WebSocket message"),
        }
    }

    /// Skip messages until one of the given top-level type arrives
    pub async fn expect(&mut self, kind: &str) -> Result<Value> {
        loop {
            let msg = self.recv_json_timeout(Duration::from_secs(3)).await?;
            if msg["type"] == kind {
                return Ok(msg);
            }
        }
    }

    /// Skip messages until a room event of the given kind arrives
    pub async fn expect_event(&mut self, kind: &str) -> Result<Value> {
        loop {
            let msg = self.expect("event").await?;
            if msg["event"]["type"] == kind {
                return Ok(msg["event"].clone());
            }
        }
    }

    /// Wait for a snapshot whose current combatant is `actor_id`
    pub async fn expect_turn(&mut self, actor_id: &str) -> Result<Value> {
        loop {
            let update = self.expect_event("combat_update").await?;
            if current_id(&update["encounter"]).as_deref() == Some(actor_id) {
                return Ok(update["encounter"].clone());
            }
        }
    }

    pub async fn close(&mut self) -> Result<()> {
        self.write.close().await?;
        Ok(())
    }
}

/// Id of the combatant whose turn it is in an encounter snapshot
pub fn current_id(encounter: &Value) -> Option<String> {
    if !encounter["active"].as_bool().unwrap_or(false) {
        return None;
    }
    let id = match encounter["interrupts"].as_array().and_then(|q| q.first()) {
        Some(holder) => holder.as_str()?.to_string(),
        None => {
            let index = encounter["turn_index"].as_u64()? as usize;
            encounter["order"][index]["id"].as_str()?.to_string()
        }
    };
    Some(id)
}
