//! Move sources for the automated opponent.
//!
//! A proposal is only a suggestion. The turn machine runs every proposal
//! through the oracle before it touches the session.

mod engine;
mod llm;

pub use engine::EngineMoveSource;
pub use llm::LlmMoveSource;

use crate::session::Difficulty;
use async_trait::async_trait;
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_new::new;
use tracing::{error, instrument};

/// A move suggested by a move source.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct Proposal {
    /// Move in whatever notation the source speaks.
    token: String,
    /// Position evaluation, when the source offers one.
    evaluation: Option<String>,
}

/// Move source failure with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Move source error: {} at {}:{}", message, file, line)]
pub struct MoveSourceError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl MoveSourceError {
    /// Creates a new move source error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let message = message.into();
        error!(error_message = %message, "Move source error created");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Proposes the opponent's next move.
#[async_trait]
pub trait MoveSource: Send + Sync {
    /// Suggests a move for the side to move in `position`.
    async fn propose(
        &self,
        position: &str,
        difficulty: Difficulty,
    ) -> Result<Proposal, MoveSourceError>;

    /// Checks that the source is reachable.
    async fn probe(&self) -> Result<(), MoveSourceError>;
}
