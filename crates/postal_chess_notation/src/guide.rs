//! Notation help text appended to player notifications.

/// How to write a move, in the form the lexical gate accepts.
pub const NOTATION_GUIDE: &str = "\
How to send a move: reply with the move as the FIRST word of your message.
  Pawn moves:     e4, d5, exd5 (capture), e8=Q (promotion)
  Piece moves:    Nf3, Bb5, Qxd7 (K king, Q queen, R rook, B bishop, N knight)
  Disambiguation: Nbd2, R1e2 (name the file or rank when two pieces can go)
  Castling:       O-O (kingside), O-O-O (queenside)
  Check/mate:     a trailing + or # is optional
Commands (first word, any case): NEW, RESIGN, PAUSE, CONTINUE
Anything after the first word is ignored.";
