//! Turn state derived from the session flags and the side to move.

use super::Session;
use tracing::instrument;

/// Where the game stands. Never stored; always derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum TurnState {
    /// Waiting for the player's next email.
    AwaitingPlayerMove,
    /// The opponent owes a move. Transient within one dispatch; persisted only
    /// when an opponent proposal failed after the player's move was committed.
    AwaitingOpponentMove,
    /// Suspended by the player.
    Paused,
    /// Finished by result or resignation.
    Ended,
}

impl TurnState {
    /// Derives the state of a session.
    #[instrument(skip(session), fields(active = session.active(), paused = session.paused()))]
    pub fn of(session: &Session) -> Self {
        if !*session.active() {
            Self::Ended
        } else if *session.paused() {
            Self::Paused
        } else if session.side_to_move() == *session.human_side() {
            Self::AwaitingPlayerMove
        } else {
            Self::AwaitingOpponentMove
        }
    }

    /// True for every state except [`TurnState::Ended`].
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Ended)
    }
}
