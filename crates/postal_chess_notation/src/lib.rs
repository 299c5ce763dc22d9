//! Pure chess notation logic for postal chess.
//!
//! Nothing in this crate performs I/O or decides legality. It provides the
//! cheap, local checks that run before any external call is spent:
//!
//! - **FEN**: parsing, well-formedness, en-passant sanitization
//! - **Tokens**: the lexical move grammar and the "move-shaped" pre-classifier
//! - **Board**: plain-text diagrams for notifications
//! - **Guide**: the notation help text sent to players

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod board;
mod fen;
mod guide;
mod side;
mod token;

pub use board::render_board;
pub use fen::{Fen, FenError, Piece, PieceKind, STARTING_FEN, is_well_formed, sanitize_en_passant};
pub use guide::NOTATION_GUIDE;
pub use side::Side;
pub use token::{first_token, is_lexically_valid, looks_like_move};
