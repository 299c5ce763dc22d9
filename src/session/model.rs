//! Session domain types.

use crate::transport::ThreadHandle;
use derive_getters::Getters;
use postal_chess_notation::{STARTING_FEN, Side};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Opponent strength, fixed when the session is created.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Difficulty {
    /// Shallow search, loose play.
    Beginner,
    /// Club strength.
    Intermediate,
    /// Strong club strength.
    Advanced,
    /// Deepest search offered.
    Expert,
}

impl Difficulty {
    /// Engine search depth for this difficulty.
    pub fn engine_depth(self) -> u8 {
        match self {
            Self::Beginner => 2,
            Self::Intermediate => 6,
            Self::Advanced => 10,
            Self::Expert => 14,
        }
    }

    /// Instruction given to a generative opponent.
    pub fn playing_style(self) -> &'static str {
        match self {
            Self::Beginner => "Play like a casual beginner: sound but simple moves, occasional inaccuracies.",
            Self::Intermediate => "Play like a solid club player.",
            Self::Advanced => "Play strong, principled chess like an experienced tournament player.",
            Self::Expert => "Play the strongest move you can find.",
        }
    }
}

/// Unguessable identifier embedded in every outbound subject line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[display("{}", _0)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generates a fresh random token.
    #[instrument]
    pub fn generate() -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("pc-{}", &id[..16]))
    }

    /// Wraps a stored token.
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    /// Returns the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Rendered move annotations, capped in length.
///
/// Once `cap` entries are held, further entries are dropped and the log is
/// marked truncated. The oldest moves are always kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct MoveLog {
    entries: Vec<String>,
    cap: usize,
    truncated: bool,
}

impl MoveLog {
    /// Creates an empty log holding at most `cap` entries.
    pub fn new(cap: usize) -> Self {
        Self {
            entries: Vec::new(),
            cap,
            truncated: false,
        }
    }

    /// Appends an entry unless the cap is reached.
    #[instrument(skip(self), fields(len = self.entries.len(), cap = self.cap))]
    pub fn push(&mut self, entry: String) {
        if self.entries.len() >= self.cap {
            if !self.truncated {
                warn!("Move log cap reached, later moves are no longer recorded");
            }
            self.truncated = true;
            return;
        }
        self.entries.push(entry);
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no moves have been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Space-separated rendering, e.g. `1.e4 1...e5`.
    pub fn render(&self) -> String {
        let mut line = self.entries.join(" ");
        if self.truncated {
            line.push_str(" ... (log truncated)");
        }
        line
    }
}

/// The one live game.
///
/// `position` is always a well-formed FEN; every store write checks it.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Session {
    position: String,
    move_log: MoveLog,
    active: bool,
    paused: bool,
    turn_number: u32,
    human_side: Side,
    difficulty: Difficulty,
    thread_handle: Option<ThreadHandle>,
    cursor: usize,
    session_token: SessionToken,
}

impl Session {
    /// Creates a fresh session at the starting position with a new token.
    #[instrument]
    pub fn new(human_side: Side, difficulty: Difficulty, move_log_cap: usize) -> Self {
        let session = Self {
            position: STARTING_FEN.to_string(),
            move_log: MoveLog::new(move_log_cap),
            active: true,
            paused: false,
            turn_number: 1,
            human_side,
            difficulty,
            thread_handle: None,
            cursor: 0,
            session_token: SessionToken::generate(),
        };
        info!(session_token = %session.session_token, ?human_side, %difficulty, "Created new session");
        session
    }

    /// Reassembles a session from stored fields.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        position: String,
        move_log: MoveLog,
        active: bool,
        paused: bool,
        turn_number: u32,
        human_side: Side,
        difficulty: Difficulty,
        thread_handle: Option<ThreadHandle>,
        cursor: usize,
        session_token: SessionToken,
    ) -> Self {
        Self {
            position,
            move_log,
            active,
            paused,
            turn_number,
            human_side,
            difficulty,
            thread_handle,
            cursor,
            session_token,
        }
    }

    /// Side to move, read from the FEN active-colour field.
    pub fn side_to_move(&self) -> Side {
        match self.position.split_whitespace().nth(1) {
            Some("b") => Side::Black,
            _ => Side::White,
        }
    }

    /// Side played by the automated opponent.
    pub fn opponent_side(&self) -> Side {
        self.human_side.opponent()
    }

    /// Numbered annotation for a move by `mover` in the current round.
    pub fn annotate(&self, mover: Side, notation: &str) -> String {
        if mover.is_first_mover() {
            format!("{}.{}", self.turn_number, notation)
        } else {
            format!("{}...{}", self.turn_number, notation)
        }
    }

    /// Adopts a new position after `mover` played `notation`.
    ///
    /// The round counter advances once the second mover has moved.
    #[instrument(skip(self, new_position), fields(session_token = %self.session_token, turn = self.turn_number))]
    pub fn record_move(&mut self, mover: Side, notation: &str, new_position: String) {
        let entry = self.annotate(mover, notation);
        debug!(entry = %entry, "Recording move");
        self.move_log.push(entry);
        self.position = new_position;
        if !mover.is_first_mover() {
            self.turn_number += 1;
        }
    }

    /// Marks the game as over.
    pub fn end(&mut self) {
        self.active = false;
        self.paused = false;
    }

    /// Sets the pause flag.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Binds the conversation thread and the number of events already in it.
    #[instrument(skip(self), fields(session_token = %self.session_token))]
    pub fn bind_thread(&mut self, handle: ThreadHandle, cursor: usize) {
        info!(thread = %handle, cursor, "Binding session to thread");
        self.thread_handle = Some(handle);
        self.cursor = cursor;
    }

    /// Moves the cursor forward. Never moves it backwards.
    pub fn advance_cursor(&mut self, to: usize) {
        if to > self.cursor {
            self.cursor = to;
        }
    }
}
