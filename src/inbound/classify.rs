//! First-word classification of fresh text.

use postal_chess_notation::{first_token, looks_like_move};
use std::str::FromStr;
use tracing::instrument;

/// Player command vocabulary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Command {
    /// Start a fresh game.
    New,
    /// Concede.
    Resign,
    /// Suspend turn-taking.
    Pause,
    /// Resume after a pause, or nudge a stalled opponent.
    Continue,
}

/// What a message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// A command word.
    Command(Command),
    /// Something shaped like a move, carried verbatim.
    MoveAttempt(String),
    /// Neither; skipped.
    Unrecognized,
}

impl Intent {
    /// True for commands and move attempts.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Intent::Unrecognized)
    }
}

/// Classifies by the first whitespace-delimited word only.
#[instrument(level = "debug", skip(fresh))]
pub fn classify(fresh: &str) -> Intent {
    let Some(token) = first_token(fresh) else {
        return Intent::Unrecognized;
    };
    let word = token.trim_end_matches(['.', ',', '!', ':', ';']);
    if let Ok(command) = Command::from_str(word) {
        return Intent::Command(command);
    }
    if looks_like_move(token) {
        return Intent::MoveAttempt(token.to_string());
    }
    Intent::Unrecognized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_case_insensitive() {
        assert_eq!(classify("resign"), Intent::Command(Command::Resign));
        assert_eq!(classify("Pause please"), Intent::Command(Command::Pause));
        assert_eq!(classify("NEW."), Intent::Command(Command::New));
        assert_eq!(classify("cOnTiNuE"), Intent::Command(Command::Continue));
    }

    #[test]
    fn only_the_first_word_counts() {
        assert_eq!(classify("Nf3 and also RESIGN"), Intent::MoveAttempt("Nf3".into()));
        assert_eq!(classify("Thanks! RESIGN"), Intent::Unrecognized);
    }

    #[test]
    fn malformed_moves_still_count_as_attempts() {
        assert_eq!(classify("Qxf99"), Intent::MoveAttempt("Qxf99".into()));
        assert_eq!(classify("O-O-O"), Intent::MoveAttempt("O-O-O".into()));
    }

    #[test]
    fn prose_and_empty_text_are_unrecognized() {
        assert_eq!(classify(""), Intent::Unrecognized);
        assert_eq!(classify("Hello there"), Intent::Unrecognized);
        assert!(!classify("hmm").is_actionable());
    }
}
