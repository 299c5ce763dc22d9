//! Side to move.

use serde::{Deserialize, Serialize};

/// One of the two sides. White always moves first.
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
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Side {
    /// The first mover.
    White,
    /// The second mover.
    Black,
}

impl Side {
    /// Returns the other side.
    pub fn opponent(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Returns true for the side that moves first in every round.
    pub fn is_first_mover(self) -> bool {
        matches!(self, Side::White)
    }

    /// FEN active-colour letter.
    pub fn fen_letter(self) -> char {
        match self {
            Side::White => 'w',
            Side::Black => 'b',
        }
    }
}
