//! Move token grammar.
//!
//! Two checks with different jobs:
//!
//! - [`looks_like_move`] is the inbound classifier: is this token an attempt
//!   at a move at all, so the player deserves a reply?
//! - [`is_lexically_valid`] is the lexical gate: is the attempt well formed
//!   enough to spend an oracle call on?
//!
//! Neither decides legality.

use regex::Regex;
use std::sync::LazyLock;
use tracing::instrument;

/// Standard algebraic notation, loosely: optional piece, optional
/// disambiguation, optional capture, destination, optional promotion,
/// optional check or mate, optional annotation glyphs. Castling in either
/// letter-O or digit-zero form.
static SAN_GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=?[QRBNqrbn])?|O-O(?:-O)?|0-0(?:-0)?)[+#]?(?:[!?]{1,2})?$",
    )
    .expect("SAN grammar is a valid regex")
});

/// Longest token still considered a move attempt.
const MAX_MOVE_SHAPED_LEN: usize = 12;

/// Returns the first whitespace-delimited token of the text.
pub fn first_token(text: &str) -> Option<&str> {
    text.split_whitespace().next()
}

/// Returns true when the token matches the lexical move grammar.
#[instrument(level = "debug")]
pub fn is_lexically_valid(token: &str) -> bool {
    SAN_GRAMMAR.is_match(token)
}

/// Returns true when the token is plausibly a move attempt.
///
/// Starts like a move (a piece letter, a file letter, or castling) and
/// contains a rank digit. Prose words rarely satisfy both.
#[instrument(level = "debug")]
pub fn looks_like_move(token: &str) -> bool {
    if token.is_empty() || token.len() > MAX_MOVE_SHAPED_LEN {
        return false;
    }
    if token.starts_with("O-O") || token.starts_with("0-0") {
        return true;
    }
    let starts_like_move = token
        .chars()
        .next()
        .is_some_and(|c| matches!(c, 'K' | 'Q' | 'R' | 'B' | 'N' | 'a'..='h'));
    starts_like_move && token.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_moves() {
        for token in [
            "e4", "Nf3", "exd5", "Qxf7#", "Rae1", "R1e2", "Nbxd7+", "e8=Q", "e7e8q", "O-O",
            "O-O-O+", "0-0", "e2e4", "Bb5!?",
        ] {
            assert!(is_lexically_valid(token), "{token} should pass");
        }
    }

    #[test]
    fn rejects_malformed_moves() {
        for token in ["Qxf99", "Zf3", "e9", "i4", "hello", "O-O-O-O", "Nf3++", ""] {
            assert!(!is_lexically_valid(token), "{token} should fail");
        }
    }

    #[test]
    fn move_shaped_tokens_include_malformed_attempts() {
        assert!(looks_like_move("Qxf99"));
        assert!(looks_like_move("e4"));
        assert!(looks_like_move("O-O"));
        assert!(!looks_like_move("Hello"));
        assert!(!looks_like_move("thanks"));
        assert!(!looks_like_move("Bishop"));
    }

    #[test]
    fn first_token_skips_leading_whitespace() {
        assert_eq!(first_token("  \n e4 please"), Some("e4"));
        assert_eq!(first_token("   "), None);
    }
}
