//! Teaching commentary on each exchange. Best effort only.

use crate::llm_client::{LlmError, TextGenerator};
use crate::session::Difficulty;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

const SYSTEM_PROMPT: &str = "You are a friendly chess coach writing to a correspondence student. \
In two or three short sentences, explain the ideas behind the student's last move and the reply. \
Plain text only, no move lists, no board diagrams.";

/// Most characters of commentary kept in a notification.
const MAX_COMMENTARY_CHARS: usize = 800;

/// Explains an exchange in prose.
#[async_trait]
pub trait CommentarySource: Send + Sync {
    /// Comments on `player_move` and the `opponent_move` that answered it.
    async fn explain(
        &self,
        position: &str,
        move_history: &str,
        player_move: &str,
        opponent_move: &str,
        difficulty: Difficulty,
    ) -> Result<String, LlmError>;
}

/// Commentary written by a language model.
#[derive(Clone)]
pub struct LlmCommentary {
    generator: Arc<dyn TextGenerator>,
}

impl LlmCommentary {
    /// Creates a commentator over `generator`.
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl CommentarySource for LlmCommentary {
    #[instrument(skip(self, position, move_history))]
    async fn explain(
        &self,
        position: &str,
        move_history: &str,
        player_move: &str,
        opponent_move: &str,
        difficulty: Difficulty,
    ) -> Result<String, LlmError> {
        let user_message = format!(
            "Position: {}\nGame so far: {}\nStudent played: {}\nReply: {}\nStudent level: {}",
            position, move_history, player_move, opponent_move, difficulty
        );
        let text = self.generator.generate(SYSTEM_PROMPT, &user_message).await?;
        let text: String = text.trim().chars().take(MAX_COMMENTARY_CHARS).collect();
        debug!(chars = text.len(), "Commentary generated");
        Ok(text)
    }
}
