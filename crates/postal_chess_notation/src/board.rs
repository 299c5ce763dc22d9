//! Plain-text board diagrams.

use crate::{Fen, Side};
use tracing::instrument;

/// Renders the position as a text diagram from `perspective`'s side.
///
/// Empty squares show as `.`, pieces as FEN letters (uppercase White).
#[instrument(level = "debug", skip(fen))]
pub fn render_board(fen: &Fen, perspective: Side) -> String {
    let ranks: Vec<u8> = match perspective {
        Side::White => (0..8).rev().collect(),
        Side::Black => (0..8).collect(),
    };
    let files: Vec<u8> = match perspective {
        Side::White => (0..8).collect(),
        Side::Black => (0..8).rev().collect(),
    };

    let mut out = String::new();
    for &rank in &ranks {
        out.push_str(&format!("{} ", rank + 1));
        for &file in &files {
            let symbol = fen.piece_at(file, rank).map_or('.', |p| p.fen_char());
            out.push(symbol);
            out.push(' ');
        }
        out.truncate(out.trim_end().len());
        out.push('\n');
    }

    out.push_str("  ");
    let labels: Vec<String> = files
        .iter()
        .map(|f| ((b'a' + f) as char).to_string())
        .collect();
    out.push_str(&labels.join(" "));
    out
}
