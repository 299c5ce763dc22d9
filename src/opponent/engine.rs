//! HTTP chess engine client.

use super::{MoveSource, MoveSourceError, Proposal};
use crate::session::Difficulty;
use async_trait::async_trait;
use postal_chess_notation::STARTING_FEN;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument};

#[derive(Debug, Serialize)]
struct EngineRequest<'a> {
    fen: &'a str,
    depth: u8,
}

#[derive(Debug, Deserialize)]
struct EngineReply {
    /// Long algebraic move, e.g. `e7e5`.
    #[serde(rename = "move")]
    lan: String,
    #[serde(default)]
    san: Option<String>,
    /// Pawns, from white's point of view.
    #[serde(default)]
    eval: Option<f64>,
    /// Moves to mate, signed from white's point of view.
    #[serde(default)]
    mate: Option<i32>,
}

impl EngineReply {
    fn evaluation(&self) -> Option<String> {
        match (self.mate, self.eval) {
            (Some(n), _) if n > 0 => Some(format!("White mates in {}", n)),
            (Some(n), _) if n < 0 => Some(format!("Black mates in {}", -n)),
            (_, Some(eval)) => Some(format!("{:+.2}", eval)),
            _ => None,
        }
    }
}

/// Move source that asks a chess engine over HTTP.
#[derive(Debug, Clone)]
pub struct EngineMoveSource {
    client: reqwest::Client,
    url: Url,
}

impl EngineMoveSource {
    /// Creates a client for the engine at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`MoveSourceError`] if the URL is invalid or the client cannot be built.
    #[instrument]
    pub fn new(url: &str, timeout: Duration) -> Result<Self, MoveSourceError> {
        let url = Url::parse(url)
            .map_err(|e| MoveSourceError::new(format!("Invalid engine URL '{}': {}", url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MoveSourceError::new(format!("Failed to build HTTP client: {}", e)))?;
        info!(%url, "Creating engine move source");
        Ok(Self { client, url })
    }

    async fn ask(&self, fen: &str, depth: u8) -> Result<EngineReply, MoveSourceError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&EngineRequest { fen, depth })
            .send()
            .await
            .map_err(|e| MoveSourceError::new(format!("Engine request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| MoveSourceError::new(format!("Failed to read engine response: {}", e)))?;
        if !status.is_success() {
            return Err(MoveSourceError::new(format!("Engine error {}: {}", status, text)));
        }
        serde_json::from_str(&text)
            .map_err(|e| MoveSourceError::new(format!("Unexpected engine response: {}", e)))
    }
}

#[async_trait]
impl MoveSource for EngineMoveSource {
    #[instrument(skip(self, position), fields(%difficulty))]
    async fn propose(
        &self,
        position: &str,
        difficulty: Difficulty,
    ) -> Result<Proposal, MoveSourceError> {
        let reply = self.ask(position, difficulty.engine_depth()).await?;
        if reply.lan.trim().is_empty() {
            return Err(MoveSourceError::new("Engine returned an empty move"));
        }
        debug!(lan = %reply.lan, san = ?reply.san, eval = ?reply.eval, "Engine proposal");
        let evaluation = reply.evaluation();
        Ok(Proposal::new(reply.lan, evaluation))
    }

    #[instrument(skip(self))]
    async fn probe(&self) -> Result<(), MoveSourceError> {
        self.ask(STARTING_FEN, 1).await?;
        info!("Engine reachable");
        Ok(())
    }
}
