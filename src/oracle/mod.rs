//! Position oracle: the only authority on move legality.

mod llm;

pub use llm::LlmOracle;

use async_trait::async_trait;
use derive_more::{Display, Error};
use postal_chess_notation::Side;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

/// Most legal alternatives ever shown to the player.
pub const MAX_ALTERNATIVES: usize = 8;

/// How a game ended on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum TerminalKind {
    /// The side to move is mated.
    #[strum(serialize = "checkmate")]
    Checkmate,
    /// The side to move has no legal move and is not in check.
    #[strum(serialize = "stalemate")]
    Stalemate,
    /// Threefold repetition.
    #[strum(serialize = "draw by repetition")]
    Repetition,
    /// Neither side can mate.
    #[strum(serialize = "draw by insufficient material")]
    InsufficientMaterial,
    /// Fifty moves without capture or pawn move.
    #[strum(serialize = "draw by the fifty-move rule")]
    FiftyMoveRule,
}

/// A finished position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminal {
    /// What ended the game.
    pub kind: TerminalKind,
    /// Winner, for decisive results.
    pub winner: Option<Side>,
}

impl Terminal {
    /// Human-readable result line.
    pub fn describe(&self) -> String {
        match self.winner {
            Some(winner) => format!("{} - {} wins", capitalize(&self.kind.to_string()), capitalize(winner.as_ref())),
            None => capitalize(&self.kind.to_string()),
        }
    }
}

/// Uppercases the first letter.
pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The oracle's judgement of one move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleVerdict {
    /// The move is legal in the given position.
    Legal {
        /// Canonical position after the move.
        new_position: String,
        /// Canonical notation of the move.
        notation: String,
        /// Set when the move ended the game.
        terminal: Option<Terminal>,
    },
    /// The move is not legal.
    Illegal {
        /// Why it was rejected.
        reason: String,
        /// Some legal moves, at most [`MAX_ALTERNATIVES`].
        alternatives: Vec<String>,
    },
}

/// The oracle could not judge: unreachable, timed out, or answered off-schema.
#[derive(Debug, Clone, Display, Error)]
#[display("Oracle error: {} at {}:{}", message, file, line)]
pub struct OracleError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl OracleError {
    /// Creates a new oracle error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let message = message.into();
        error!(error_message = %message, "Oracle error created");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Judges moves against positions.
#[async_trait]
pub trait PositionOracle: Send + Sync {
    /// Checks `token` in `position` and, if legal, returns the resulting position.
    ///
    /// `move_history` is the rendered move list leading to `position`; draws
    /// by repetition can only be judged from it.
    async fn validate_and_apply(
        &self,
        position: &str,
        move_history: &str,
        token: &str,
    ) -> Result<OracleVerdict, OracleError>;

    /// True when `position` is a position this oracle accepts as input.
    fn is_well_formed(&self, position: &str) -> bool;
}
