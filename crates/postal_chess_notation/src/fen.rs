//! Forsyth–Edwards Notation parsing and structural checks.
//!
//! Legality is never decided here. A well-formed FEN only promises a board
//! the rules oracle will accept as input: eight ranks of eight files, one king
//! per side, no pawns on the back ranks, and consistent metadata fields.

use crate::Side;
use std::str::FromStr;
use tracing::{debug, instrument, warn};

/// Position at the start of a standard game.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Kind of chess piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    /// Pawn.
    Pawn,
    /// Knight.
    Knight,
    /// Bishop.
    Bishop,
    /// Rook.
    Rook,
    /// Queen.
    Queen,
    /// King.
    King,
}

/// A piece with its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    /// What the piece is.
    pub kind: PieceKind,
    /// Who owns it.
    pub side: Side,
}

impl Piece {
    /// Parses a FEN piece letter (uppercase is White).
    pub fn from_fen_char(c: char) -> Option<Self> {
        let kind = match c.to_ascii_lowercase() {
            'p' => PieceKind::Pawn,
            'n' => PieceKind::Knight,
            'b' => PieceKind::Bishop,
            'r' => PieceKind::Rook,
            'q' => PieceKind::Queen,
            'k' => PieceKind::King,
            _ => return None,
        };
        let side = if c.is_ascii_uppercase() {
            Side::White
        } else {
            Side::Black
        };
        Some(Self { kind, side })
    }

    /// Returns the FEN letter for this piece.
    pub fn fen_char(&self) -> char {
        let c = match self.kind {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        };
        match self.side {
            Side::White => c.to_ascii_uppercase(),
            Side::Black => c,
        }
    }
}

/// Why a FEN string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum FenError {
    /// Wrong number of space-separated fields.
    #[display("Expected 6 fields, found {}", _0)]
    FieldCount(usize),

    /// Piece placement is not eight ranks of eight files.
    #[display("Malformed piece placement: {}", _0)]
    Placement(String),

    /// A side does not have exactly one king.
    #[display("{} has {} kings", _0, _1)]
    KingCount(Side, usize),

    /// A pawn stands on the first or eighth rank.
    #[display("Pawn on back rank")]
    PawnOnBackRank,

    /// Active colour is not `w` or `b`.
    #[display("Invalid side to move: {}", _0)]
    SideToMove(String),

    /// Castling field is not `-` or an ordered subset of `KQkq`.
    #[display("Invalid castling field: {}", _0)]
    Castling(String),

    /// En-passant field is not `-` or a square on the correct rank.
    #[display("Invalid en passant field: {}", _0)]
    EnPassant(String),

    /// Halfmove or fullmove counter is not a valid number.
    #[display("Invalid move counter: {}", _0)]
    Counter(String),
}

impl std::error::Error for FenError {}

/// A parsed position.
///
/// `ranks[0]` is the eighth rank, `ranks[7]` the first; files run a to h.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fen {
    ranks: [[Option<Piece>; 8]; 8],
    side_to_move: Side,
    castling: String,
    en_passant: Option<(u8, u8)>,
    halfmove: u32,
    fullmove: u32,
}

impl Fen {
    /// Parses and structurally validates a FEN string.
    ///
    /// # Errors
    ///
    /// Returns [`FenError`] describing the first structural problem found.
    #[instrument(level = "debug")]
    pub fn parse(fen: &str) -> Result<Self, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(FenError::FieldCount(fields.len()));
        }

        let ranks = parse_placement(fields[0])?;

        for side in [Side::White, Side::Black] {
            let kings = ranks
                .iter()
                .flatten()
                .flatten()
                .filter(|p| p.kind == PieceKind::King && p.side == side)
                .count();
            if kings != 1 {
                return Err(FenError::KingCount(side, kings));
            }
        }

        if [ranks[0], ranks[7]]
            .iter()
            .flatten()
            .flatten()
            .any(|p| p.kind == PieceKind::Pawn)
        {
            return Err(FenError::PawnOnBackRank);
        }

        let side_to_move = match fields[1] {
            "w" => Side::White,
            "b" => Side::Black,
            other => return Err(FenError::SideToMove(other.to_string())),
        };

        let castling = fields[2];
        if !is_valid_castling(castling) {
            return Err(FenError::Castling(castling.to_string()));
        }

        let en_passant = parse_en_passant(fields[3], side_to_move)?;

        let halfmove = u32::from_str(fields[4]).map_err(|_| FenError::Counter(fields[4].to_string()))?;
        let fullmove = u32::from_str(fields[5])
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| FenError::Counter(fields[5].to_string()))?;

        Ok(Self {
            ranks,
            side_to_move,
            castling: castling.to_string(),
            en_passant,
            halfmove,
            fullmove,
        })
    }

    /// Returns the side to move.
    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    /// Returns the piece on a square, files and ranks zero-based from a1.
    pub fn piece_at(&self, file: u8, rank: u8) -> Option<Piece> {
        if file > 7 || rank > 7 {
            return None;
        }
        self.ranks[7 - rank as usize][file as usize]
    }

    /// Returns the en-passant target square, if any, zero-based from a1.
    pub fn en_passant(&self) -> Option<(u8, u8)> {
        self.en_passant
    }

    /// Returns the fullmove counter.
    pub fn fullmove(&self) -> u32 {
        self.fullmove
    }

    /// Clears an en-passant target that no pawn can actually capture.
    ///
    /// Returns true when the field changed.
    #[instrument(level = "debug", skip(self))]
    pub fn clear_uncapturable_en_passant(&mut self) -> bool {
        let Some((file, rank)) = self.en_passant else {
            return false;
        };

        // The pawn that just double-stepped sits one rank behind the target,
        // from the capturer's point of view.
        let (pawn_rank, capturer) = match self.side_to_move {
            Side::White => (4, Side::White),
            Side::Black => (3, Side::Black),
        };
        let expected_target_rank = match self.side_to_move {
            Side::White => 5,
            Side::Black => 2,
        };

        let pushed = Piece {
            kind: PieceKind::Pawn,
            side: capturer.opponent(),
        };
        let taker = Piece {
            kind: PieceKind::Pawn,
            side: capturer,
        };

        let valid = rank == expected_target_rank
            && self.piece_at(file, pawn_rank) == Some(pushed)
            && ((file > 0 && self.piece_at(file - 1, pawn_rank) == Some(taker))
                || (file < 7 && self.piece_at(file + 1, pawn_rank) == Some(taker)));

        if !valid {
            debug!(file, rank, "Clearing uncapturable en passant square");
            self.en_passant = None;
        }
        !valid
    }

    /// Serializes back to a FEN string.
    pub fn to_fen_string(&self) -> String {
        let mut placement = String::new();
        for (i, rank) in self.ranks.iter().enumerate() {
            let mut empty = 0;
            for square in rank {
                match square {
                    Some(piece) => {
                        if empty > 0 {
                            placement.push_str(&empty.to_string());
                            empty = 0;
                        }
                        placement.push(piece.fen_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                placement.push_str(&empty.to_string());
            }
            if i < 7 {
                placement.push('/');
            }
        }

        let en_passant = match self.en_passant {
            Some((file, rank)) => format!("{}{}", (b'a' + file) as char, rank + 1),
            None => "-".to_string(),
        };

        format!(
            "{} {} {} {} {} {}",
            placement,
            self.side_to_move.fen_letter(),
            self.castling,
            en_passant,
            self.halfmove,
            self.fullmove
        )
    }
}

impl FromStr for Fen {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Fen::parse(s)
    }
}

impl std::fmt::Display for Fen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_fen_string())
    }
}

fn parse_placement(placement: &str) -> Result<[[Option<Piece>; 8]; 8], FenError> {
    let rows: Vec<&str> = placement.split('/').collect();
    if rows.len() != 8 {
        return Err(FenError::Placement(format!("{} ranks", rows.len())));
    }

    let mut ranks = [[None; 8]; 8];
    for (r, row) in rows.iter().enumerate() {
        let mut file = 0usize;
        let mut previous_was_digit = false;
        for c in row.chars() {
            if let Some(n) = c.to_digit(10) {
                if !(1..=8).contains(&n) || previous_was_digit {
                    return Err(FenError::Placement(format!("bad empty run in '{}'", row)));
                }
                file += n as usize;
                previous_was_digit = true;
            } else {
                let piece = Piece::from_fen_char(c)
                    .ok_or_else(|| FenError::Placement(format!("unknown piece '{}'", c)))?;
                if file >= 8 {
                    return Err(FenError::Placement(format!("rank '{}' too long", row)));
                }
                ranks[r][file] = Some(piece);
                file += 1;
                previous_was_digit = false;
            }
            if file > 8 {
                return Err(FenError::Placement(format!("rank '{}' too long", row)));
            }
        }
        if file != 8 {
            return Err(FenError::Placement(format!("rank '{}' has {} files", row, file)));
        }
    }
    Ok(ranks)
}

fn is_valid_castling(castling: &str) -> bool {
    if castling == "-" {
        return true;
    }
    // Ordered subset of KQkq with no repeats.
    let mut rest = "KQkq";
    for c in castling.chars() {
        match rest.find(c) {
            Some(i) => rest = &rest[i + 1..],
            None => return false,
        }
    }
    !castling.is_empty()
}

fn parse_en_passant(field: &str, side_to_move: Side) -> Result<Option<(u8, u8)>, FenError> {
    if field == "-" {
        return Ok(None);
    }
    let bytes = field.as_bytes();
    if bytes.len() != 2 || !(b'a'..=b'h').contains(&bytes[0]) {
        return Err(FenError::EnPassant(field.to_string()));
    }
    let expected_rank = match side_to_move {
        Side::White => b'6',
        Side::Black => b'3',
    };
    if bytes[1] != expected_rank {
        return Err(FenError::EnPassant(field.to_string()));
    }
    Ok(Some((bytes[0] - b'a', bytes[1] - b'1')))
}

/// Returns true when the string is a structurally valid FEN.
#[instrument(level = "debug")]
pub fn is_well_formed(fen: &str) -> bool {
    match Fen::parse(fen) {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "FEN is not well formed");
            false
        }
    }
}

/// Returns the FEN with any uncapturable en-passant target replaced by `-`.
///
/// # Errors
///
/// Returns [`FenError`] if the input is not well formed.
#[instrument(level = "debug")]
pub fn sanitize_en_passant(fen: &str) -> Result<String, FenError> {
    let mut parsed = Fen::parse(fen)?;
    parsed.clear_uncapturable_en_passant();
    Ok(parsed.to_fen_string())
}
