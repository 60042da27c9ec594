//! skirmish - tabletop combat resolution daemon
//!
//! Runs turn-based encounters per room: initiative, attacks and spells, held
//! turns, reactions, death saves and autonomous monster turns, served to
//! clients over WebSocket.

pub mod api;
pub mod combat;
pub mod narrator;
pub mod room;
pub mod timers;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use combat::TargetingPolicy;
use narrator::{NarratorClient, NarratorConfig};
use room::{RoomRegistry, RoomSettings};

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Pause after a monster's narrated result before its turn ends
    pub npc_turn_delay_ms: u64,
    pub targeting: TargetingPolicy,
    /// Per-room event backlog for slow viewers
    pub event_buffer: usize,
    pub narrator: NarratorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            npc_turn_delay_ms: 1500,
            targeting: TargetingPolicy::Threat,
            event_buffer: 256,
            narrator: NarratorConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),

    #[error("config file not found: {0}")]
    Missing(String),
}

impl Config {
    /// Defaults, then the optional TOML file, then `SKIRMISH_*` environment
    /// variables (`__` separates nested keys, e.g. `SKIRMISH_NARRATOR__API_KEY`)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::Missing(path.display().to_string()));
            }
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed("SKIRMISH_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Invalid(Box::new(e)))
    }

    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            npc_turn_delay: Duration::from_millis(self.npc_turn_delay_ms),
            targeting: self.targeting,
            event_buffer: self.event_buffer,
            rng_seed: None,
        }
    }
}

/// The skirmish server instance
pub struct Server {
    config: Config,
    rooms: Arc<RoomRegistry>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Result<Self> {
        let narrator = NarratorClient::new(config.narrator.clone())?;
        if !narrator.is_configured() {
            info!("no narrator API key, using templated narration");
        }
        let rooms = RoomRegistry::new(config.room_settings(), Arc::new(narrator));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            rooms: Arc::new(rooms),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get the room registry
    pub fn rooms(&self) -> Arc<RoomRegistry> {
        self.rooms.clone()
    }

    fn router(&self) -> Router {
        api::router(self.rooms.clone())
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("skirmish listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("skirmish shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
