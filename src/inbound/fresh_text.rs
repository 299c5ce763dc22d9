//! Extraction of the newly written part of an email body.

use regex::Regex;
use std::sync::LazyLock;
use tracing::instrument;

/// Lines at which quoted history, signatures or forwarded content begin.
static BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^\s*>                                   # quoted line
        | ^On\s.*wrote:\s*$                     # reply attribution
        | ^--\s*$                               # signature delimiter
        | ^-{2,}\s*Original\s+Message\s*-{2,}   # Outlook reply
        | ^-{2,}\s*Forwarded\s+message\s*-{2,}  # Gmail forward
        | ^Begin\s+forwarded\s+message:         # Apple Mail forward
        | ^_{10,}\s*$                           # Outlook separator
        | ^From:\s.+                            # inlined headers
        ",
    )
    .expect("boundary pattern is a valid regex")
});

/// Returns the text before the first quote, signature or forward marker.
///
/// The result is trimmed and may be empty.
#[instrument(level = "debug", skip(body), fields(body_len = body.len()))]
pub fn fresh_text(body: &str) -> String {
    let mut kept = Vec::new();
    let mut lines = body.lines().peekable();
    while let Some(line) = lines.next() {
        if BOUNDARY.is_match(line) {
            break;
        }
        // Attribution lines are often wrapped: "On Mon, ... Pat" / "<pat@x> wrote:".
        if line.trim_start().starts_with("On ")
            && lines
                .peek()
                .is_some_and(|next| next.trim_end().ends_with("wrote:"))
        {
            break;
        }
        kept.push(line);
    }
    kept.join("\n").trim().to_string()
}
