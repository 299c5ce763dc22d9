//! Notification rendering.
//!
//! Rendering is a pure function of the notification and the session it
//! describes. Every body starts with [`OUTBOUND_PREFIX`] so the reconciler can
//! recognise its own messages if they ever come back in.

use crate::oracle::{Terminal, capitalize};
use crate::session::Session;
use derive_getters::Getters;
use postal_chess_notation::{Fen, NOTATION_GUIDE, render_board};
use tracing::{instrument, warn};

/// First text of every outbound body.
pub const OUTBOUND_PREFIX: &str = "[postal-chess]";

/// Prefixes of bodies the reconciler must never treat as player input.
pub const OUTBOUND_PREFIXES: &[&str] = &[OUTBOUND_PREFIX];

/// What happened, with the details the player needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A fresh game, possibly already opened by the opponent.
    GameStarted {
        /// The opponent's annotated opening move, when it moves first.
        opening: Option<String>,
        /// Engine evaluation after the opening move.
        evaluation: Option<String>,
    },
    /// The opponent answered.
    OpponentMoved {
        /// The player's annotated move, absent when retrying a stalled turn.
        player_move: Option<String>,
        /// The opponent's annotated move.
        opponent_move: String,
        /// Engine evaluation after the reply.
        evaluation: Option<String>,
        /// Coaching prose; empty when unavailable.
        commentary: String,
        /// Set when the reply ended the game.
        result: Option<Terminal>,
    },
    /// The player's own move ended the game.
    GameOver {
        /// The player's annotated move.
        player_move: String,
        /// How it ended.
        result: Terminal,
    },
    /// The first word was not readable as a move.
    FormatRejected {
        /// What the player sent.
        token: String,
    },
    /// The move is not legal in the current position.
    IllegalMove {
        /// What the player sent.
        token: String,
        /// Why it was rejected.
        reason: String,
        /// Some legal moves.
        alternatives: Vec<String>,
    },
    /// The player resigned.
    Resigned,
    /// The game is now paused.
    Paused,
    /// PAUSE while already paused.
    AlreadyPaused,
    /// The game is running again.
    Resumed,
    /// CONTINUE while not paused.
    NotPaused,
    /// A move arrived while paused.
    PausedReminder {
        /// What the player sent.
        token: String,
    },
    /// Input arrived with no game running.
    NoActiveGame,
    /// The oracle was called too recently.
    RateLimited {
        /// What the player sent.
        token: String,
        /// Whole seconds until a retry is accepted.
        retry_after_secs: i64,
    },
    /// A move arrived while the opponent's reply is still owed.
    AwaitingOpponent,
}

/// A message ready to hand to the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct RenderedMessage {
    subject: String,
    body: String,
}

/// Subject line shared by every message of a session.
pub fn subject_for(session: &Session) -> String {
    format!("Correspondence chess [{}]", session.session_token())
}

fn headline(notification: &Notification, session: &Session) -> String {
    match notification {
        Notification::GameStarted { opening: None, .. } => format!(
            "New game started. You play {} at {} level. Your move.",
            session.human_side().as_ref(),
            session.difficulty()
        ),
        Notification::GameStarted {
            opening: Some(opening),
            ..
        } => format!(
            "New game started. You play {} at {} level. I open with {}. Your move.",
            session.human_side().as_ref(),
            session.difficulty(),
            opening
        ),
        Notification::OpponentMoved {
            player_move: Some(player_move),
            opponent_move,
            ..
        } => format!("You played {}. I reply {}.", player_move, opponent_move),
        Notification::OpponentMoved {
            player_move: None,
            opponent_move,
            ..
        } => format!("Sorry for the delay. I play {}.", opponent_move),
        Notification::GameOver { player_move, .. } => format!("You played {}.", player_move),
        Notification::FormatRejected { token } => format!(
            "I could not read '{}' as a move. Nothing was played; see the guide below.",
            token
        ),
        Notification::IllegalMove { token, reason, .. } => {
            format!("'{}' is not legal here: {}. Nothing was played.", token, reason)
        }
        Notification::Resigned => format!(
            "You resigned. {} wins. Reply NEW to start another game.",
            capitalize(session.opponent_side().as_ref())
        ),
        Notification::Paused => "Game paused. Reply CONTINUE when you want to carry on.".into(),
        Notification::AlreadyPaused => {
            "The game is already paused. Reply CONTINUE to carry on.".into()
        }
        Notification::Resumed => "Game resumed.".into(),
        Notification::NotPaused => "The game is not paused, nothing to continue.".into(),
        Notification::PausedReminder { token } => format!(
            "The game is paused, so '{}' was not played. Reply CONTINUE first.",
            token
        ),
        Notification::NoActiveGame => {
            "There is no game in progress. Reply NEW to start one.".into()
        }
        Notification::RateLimited {
            token,
            retry_after_secs,
        } => format!(
            "Moves are arriving faster than I can check them. '{}' was not played; please send it again in about {} seconds.",
            token, retry_after_secs
        ),
        Notification::AwaitingOpponent => {
            "I still owe you a reply to your last move. Reply CONTINUE to nudge me.".into()
        }
    }
}

/// Renders `notification` about `session`.
#[instrument(skip(session), fields(session_token = %session.session_token()))]
pub fn render(notification: &Notification, session: &Session) -> RenderedMessage {
    let mut body = format!("{} {}\n", OUTBOUND_PREFIX, headline(notification, session));

    match notification {
        Notification::GameStarted {
            evaluation: Some(evaluation),
            ..
        }
        | Notification::OpponentMoved {
            evaluation: Some(evaluation),
            ..
        } => {
            body.push_str(&format!("Evaluation: {}\n", evaluation));
        }
        _ => {}
    }
    if let Notification::OpponentMoved { commentary, .. } = notification
        && !commentary.is_empty()
    {
        body.push_str(&format!("\nCoach: {}\n", commentary));
    }
    if let Notification::IllegalMove { alternatives, .. } = notification
        && !alternatives.is_empty()
    {
        body.push_str(&format!("Some legal moves: {}\n", alternatives.join(", ")));
    }

    let result = match notification {
        Notification::OpponentMoved {
            result: Some(result),
            ..
        }
        | Notification::GameOver { result, .. } => Some(result),
        _ => None,
    };

    match session.position().parse::<Fen>() {
        Ok(fen) => {
            body.push('\n');
            body.push_str(&render_board(&fen, *session.human_side()));
            body.push('\n');
        }
        Err(e) => warn!(error = %e, "Cannot draw board for stored position"),
    }

    if !session.move_log().is_empty() {
        body.push_str(&format!("\nMoves: {}\n", session.move_log().render()));
    }
    if let Some(result) = result {
        body.push_str(&format!(
            "\nResult: {}. Reply NEW to start another game.\n",
            result.describe()
        ));
    }
    if *session.active() {
        body.push('\n');
        body.push_str(NOTATION_GUIDE);
        body.push('\n');
    }

    RenderedMessage {
        subject: subject_for(session),
        body,
    }
}
