//! Narrative service client
//!
//! Provides:
//! - Chat completions against an OpenAI-compatible API
//! - Rate limiting per room
//! - Built-in templates when the service is unconfigured or failing

pub mod templates;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You narrate a tabletop battle. Describe the outcome you are \
given in one or two vivid sentences. Never change who was hit or the numbers.";

/// Narrative service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    pub api_url: String,
    /// No key means templated narration only
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub requests_per_minute: u32,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.venice.ai/api/v1".to_string(),
            api_key: None,
            model: "llama-3.3-70b".to_string(),
            timeout_secs: 20,
            requests_per_minute: 30,
        }
    }
}

#[derive(Debug, Error)]
pub enum NarrationError {
    #[error("narrator API key not configured")]
    NotConfigured,

    #[error("narration rate limit exceeded")]
    RateLimited,

    #[error("narration request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("narrator API error: {0}")]
    Api(reqwest::StatusCode),

    #[error("narrator returned no text")]
    Empty,
}

/// Chat message for the completion API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Token bucket per room
#[derive(Debug)]
pub struct RateLimiter {
    /// room_id -> (tokens, last_refill)
    buckets: RwLock<HashMap<String, (f32, Instant)>>,
    max_tokens: f32,
    /// Tokens per second
    refill_rate: f32,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let max = requests_per_minute.max(1) as f32;
        Self {
            buckets: RwLock::new(HashMap::new()),
            max_tokens: max,
            refill_rate: max / 60.0,
        }
    }

    /// Consume a token (returns false if rate limited)
    pub async fn consume(&self, room_id: &str) -> bool {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();
        let (tokens, last_refill) = buckets
            .entry(room_id.to_string())
            .or_insert((self.max_tokens, now));

        let elapsed = now.duration_since(*last_refill).as_secs_f32();
        let refilled = (*tokens + elapsed * self.refill_rate).min(self.max_tokens);
        *last_refill = now;

        if refilled >= 1.0 {
            *tokens = refilled - 1.0;
            true
        } else {
            *tokens = refilled;
            false
        }
    }
}

/// Client for the narrative service
#[derive(Debug)]
pub struct NarratorClient {
    client: Client,
    config: NarratorConfig,
    rate_limiter: RateLimiter,
}

impl NarratorClient {
    pub fn new(config: NarratorConfig) -> Result<Self, NarrationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(config.requests_per_minute),
            config,
        })
    }

    /// Check if an API key is configured
    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Turn a plain description of what happened into narration
    pub async fn narrate(&self, room_id: &str, outcome: &str) -> Result<String, NarrationError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or(NarrationError::NotConfigured)?;

        if !self.rate_limiter.consume(room_id).await {
            return Err(NarrationError::RateLimited);
        }

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(outcome)],
            max_tokens: 200,
            temperature: 0.8,
        };

        debug!(room = %room_id, model = %self.config.model, "requesting narration");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "narrator API error");
            return Err(NarrationError::Api(status));
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(NarrationError::Empty)
    }

    /// Narrate, falling back to `fallback` on any failure.
    /// Returns the text and whether the fallback was used.
    pub async fn narrate_or(
        &self,
        room_id: &str,
        outcome: &str,
        fallback: String,
    ) -> (String, bool) {
        match self.narrate(room_id, outcome).await {
            Ok(text) => (text, false),
            Err(NarrationError::NotConfigured) => (fallback, true),
            Err(e) => {
                warn!(room = %room_id, error = %e, "narration failed, using template");
                (fallback, true)
            }
        }
    }
}
