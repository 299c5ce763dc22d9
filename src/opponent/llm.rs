//! Generative opponent.

use super::{MoveSource, MoveSourceError, Proposal};
use crate::llm_client::TextGenerator;
use crate::llm_response::{Parsed, parse_reply};
use crate::session::Difficulty;
use async_trait::async_trait;
use postal_chess_notation::Fen;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const SYSTEM_PROMPT: &str = r#"You are playing a game of correspondence chess.
You receive the current position in FEN. Choose one legal move for the side to move.
Reply with exactly {"move":"<move in standard algebraic notation>"} and nothing else."#;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MoveReply {
    #[serde(rename = "move")]
    token: String,
}

/// Move source that asks a language model.
#[derive(Clone)]
pub struct LlmMoveSource {
    generator: Arc<dyn TextGenerator>,
}

impl LlmMoveSource {
    /// Creates a move source over `generator`.
    #[instrument(skip(generator))]
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        info!("Creating LLM move source");
        Self { generator }
    }
}

#[async_trait]
impl MoveSource for LlmMoveSource {
    #[instrument(skip(self, position), fields(%difficulty))]
    async fn propose(
        &self,
        position: &str,
        difficulty: Difficulty,
    ) -> Result<Proposal, MoveSourceError> {
        let side = position
            .parse::<Fen>()
            .map(|fen| fen.side_to_move())
            .map_err(|e| MoveSourceError::new(format!("Refusing to move from bad position: {}", e)))?;
        let user_message = format!(
            "Position: {}\nYou are playing {}.\n{}",
            position,
            side.as_ref(),
            difficulty.playing_style()
        );
        let reply = self
            .generator
            .generate(SYSTEM_PROMPT, &user_message)
            .await
            .map_err(|e| MoveSourceError::new(format!("Opponent model unavailable: {}", e.message)))?;

        match parse_reply::<MoveReply>(&reply) {
            Parsed::Ok(MoveReply { token }) if !token.trim().is_empty() => {
                debug!(%token, "Model proposal");
                Ok(Proposal::new(token.trim().to_string(), None))
            }
            Parsed::Ok(_) => Err(MoveSourceError::new("Opponent model returned an empty move")),
            Parsed::Malformed(reason) => Err(MoveSourceError::new(format!(
                "Opponent model reply malformed: {}",
                reason
            ))),
        }
    }

    #[instrument(skip(self))]
    async fn probe(&self) -> Result<(), MoveSourceError> {
        self.generator
            .generate("Reply with the single word: ready", "ready?")
            .await
            .map_err(|e| MoveSourceError::new(format!("Opponent model unavailable: {}", e.message)))?;
        info!("Opponent model reachable");
        Ok(())
    }
}
