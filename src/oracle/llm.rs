//! Oracle backed by an LLM acting as a chess validator.
//!
//! The model is not trusted to be right about anything it can be checked
//! on: its reply must match the schema exactly, the position it returns must
//! parse as a FEN with the move side flipped, and its en-passant square is
//! cleared when no pawn could use it.

use super::{MAX_ALTERNATIVES, OracleError, OracleVerdict, PositionOracle, Terminal, TerminalKind};
use crate::llm_client::TextGenerator;
use crate::llm_response::{Parsed, parse_reply};
use async_trait::async_trait;
use postal_chess_notation::{Fen, Side, is_well_formed, sanitize_en_passant};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const SYSTEM_PROMPT: &str = r#"You are a chess move validator. You receive a position in FEN, the moves played so far, and one move written by a player.

Decide whether the move is legal in that position.

Move interpretation:
- A bare square such as "b3" or "e4" is a pawn move to that square.
- Piece moves carry the piece letter: "Nf3", "Be5", "Qd4". Captures may use "x".
- Coordinate moves such as "e2e4" or "e7e8q" are also accepted.
- Castling is "O-O" or "O-O-O".

If the move is legal, reply with exactly:
{"valid":true,"fen":"<FEN after the move>","move":"<standard algebraic notation>","terminal":null}
Set "terminal" to {"kind":"checkmate","winner":"white"|"black"} when the move mates, or to
{"kind":"stalemate"|"repetition"|"insufficient_material"|"fifty_move_rule","winner":null} when the game is drawn.
Judge repetition from the moves played so far together with the move.
Set the en passant square to "-" unless a pawn just advanced two squares and an enemy pawn can capture it.

If the move is illegal, reply with exactly:
{"valid":false,"reason":"<why it is illegal>","legal_alternatives":["<up to 8 legal moves>"]}

Reply with the JSON object only, no other text."#;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TerminalReply {
    kind: TerminalKind,
    winner: Option<Side>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ValidatorReply {
    valid: bool,
    #[serde(default)]
    fen: Option<String>,
    #[serde(default, rename = "move")]
    notation: Option<String>,
    #[serde(default)]
    terminal: Option<TerminalReply>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    legal_alternatives: Option<Vec<String>>,
}

/// [`PositionOracle`] that asks a language model.
#[derive(Clone)]
pub struct LlmOracle {
    generator: Arc<dyn TextGenerator>,
}

impl LlmOracle {
    /// Creates an oracle over `generator`.
    #[instrument(skip(generator))]
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        info!("Creating LLM oracle");
        Self { generator }
    }
}

fn validator_request(position: &str, current: &Fen, move_history: &str, token: &str) -> String {
    let history = match move_history.trim() {
        "" => "(none)",
        moves => moves,
    };
    format!(
        "Current FEN: {}\nSide to move: {}\nMoves so far: {}\nMove: {}",
        position,
        current.side_to_move().as_ref(),
        history,
        token
    )
}

/// Turns a schema-valid reply into a verdict, checking it against the input.
fn judge(position: &Fen, reply: ValidatorReply) -> Result<OracleVerdict, String> {
    if !reply.valid {
        if reply.fen.is_some() || reply.notation.is_some() || reply.terminal.is_some() {
            return Err("illegal verdict carried a resulting position".into());
        }
        let reason = reply
            .reason
            .filter(|r| !r.trim().is_empty())
            .ok_or("illegal verdict without a reason")?;
        let mut alternatives = reply.legal_alternatives.unwrap_or_default();
        alternatives.retain(|m| !m.trim().is_empty());
        alternatives.truncate(MAX_ALTERNATIVES);
        return Ok(OracleVerdict::Illegal {
            reason,
            alternatives,
        });
    }

    if reply.reason.is_some() || reply.legal_alternatives.is_some() {
        return Err("legal verdict carried a rejection reason".into());
    }
    let fen = reply.fen.ok_or("legal verdict without a position")?;
    let notation = reply
        .notation
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or("legal verdict without notation")?;

    let sanitized = sanitize_en_passant(&fen).map_err(|e| format!("returned position rejected: {}", e))?;
    let after: Fen = sanitized
        .parse()
        .map_err(|e| format!("returned position rejected: {}", e))?;
    let mover = position.side_to_move();
    if after.side_to_move() != mover.opponent() {
        return Err(format!(
            "returned position still has {} to move",
            mover.as_ref()
        ));
    }

    let terminal = match reply.terminal {
        None => None,
        Some(TerminalReply { kind: TerminalKind::Checkmate, winner }) => {
            if winner != Some(mover) {
                return Err("checkmate must be won by the side that moved".into());
            }
            Some(Terminal {
                kind: TerminalKind::Checkmate,
                winner,
            })
        }
        Some(TerminalReply { kind, winner: None }) => Some(Terminal { kind, winner: None }),
        Some(TerminalReply { kind, .. }) => {
            return Err(format!("{} cannot have a winner", kind));
        }
    };

    Ok(OracleVerdict::Legal {
        new_position: sanitized,
        notation,
        terminal,
    })
}

#[async_trait]
impl PositionOracle for LlmOracle {
    #[instrument(skip(self, position, move_history), fields(token = %token))]
    async fn validate_and_apply(
        &self,
        position: &str,
        move_history: &str,
        token: &str,
    ) -> Result<OracleVerdict, OracleError> {
        let current: Fen = position
            .parse()
            .map_err(|e| OracleError::new(format!("Refusing to validate against bad position: {}", e)))?;

        let user_message = validator_request(position, &current, move_history, token);
        let reply = self
            .generator
            .generate(SYSTEM_PROMPT, &user_message)
            .await
            .map_err(|e| OracleError::new(format!("Validator unavailable: {}", e.message)))?;

        let parsed = match parse_reply::<ValidatorReply>(&reply) {
            Parsed::Ok(parsed) => parsed,
            Parsed::Malformed(reason) => {
                return Err(OracleError::new(format!("Validator reply malformed: {}", reason)));
            }
        };

        match judge(&current, parsed) {
            Ok(verdict) => {
                debug!(?verdict, "Validator verdict");
                Ok(verdict)
            }
            Err(reason) => {
                warn!(%reason, "Validator reply inconsistent with position");
                Err(OracleError::new(format!("Validator reply rejected: {}", reason)))
            }
        }
    }

    fn is_well_formed(&self, position: &str) -> bool {
        is_well_formed(position)
    }
}
