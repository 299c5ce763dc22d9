//! Errors surfaced by operator entry points.

use crate::config::ConfigError;
use crate::db::DbError;
use crate::lock::LockError;
use crate::opponent::MoveSourceError;
use crate::oracle::OracleError;
use crate::transport::TransportError;

/// Why the opponent's half of a turn could not be played.
///
/// The player's move that preceded it is already saved.
#[derive(Debug, Clone, derive_more::Display)]
pub enum OpponentFailure {
    /// The move source could not be reached or answered off-schema.
    #[display("move source failed: {}", _0)]
    Unavailable(MoveSourceError),

    /// The oracle judged the proposal illegal.
    #[display("proposal '{}' is illegal: {}", token, reason)]
    Rejected {
        /// What the move source proposed.
        token: String,
        /// The oracle's reason.
        reason: String,
    },

    /// The oracle could not judge the proposal.
    #[display("proposal '{}' could not be checked: {}", token, source)]
    Unverifiable {
        /// What the move source proposed.
        token: String,
        /// The oracle failure.
        source: OracleError,
    },
}

impl std::error::Error for OpponentFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unavailable(e) => Some(e),
            Self::Rejected { .. } => None,
            Self::Unverifiable { source, .. } => Some(source),
        }
    }
}

/// A tick or operator command that could not complete.
#[derive(Debug, Clone, derive_more::Display, derive_more::From)]
pub enum TickError {
    /// Missing or invalid configuration.
    #[display("{}", _0)]
    Config(ConfigError),

    /// The session store failed.
    #[display("{}", _0)]
    Store(DbError),

    /// Another tick held the lock too long.
    #[display("{}", _0)]
    Lock(LockError),

    /// The mail transport failed.
    #[display("{}", _0)]
    Transport(TransportError),

    /// The oracle could not judge the player's move.
    #[display("{}", _0)]
    Oracle(OracleError),

    /// The opponent's reply failed after the player's move was saved.
    #[display("Opponent reply failed, player is waiting: {}", _0)]
    Opponent(OpponentFailure),

    /// A position that must not be stored.
    #[display("Refusing to store malformed position '{}'", position)]
    #[from(ignore)]
    CorruptPosition {
        /// The offending position.
        position: String,
    },
}

impl std::error::Error for TickError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Lock(e) => Some(e),
            Self::Transport(e) => Some(e),
            Self::Oracle(e) => Some(e),
            Self::Opponent(e) => Some(e),
            Self::CorruptPosition { .. } => None,
        }
    }
}

impl TickError {
    /// True when the player is left without a reply and an operator should look.
    pub fn needs_operator(&self) -> bool {
        matches!(self, Self::Opponent(_) | Self::CorruptPosition { .. })
    }
}
