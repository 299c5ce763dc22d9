//! Inbound message reconciliation.

mod classify;
mod fresh_text;
mod reconciler;

pub use classify::{Command, Intent, classify};
pub use fresh_text::fresh_text;
pub use reconciler::{Dispatch, ScanOutcome, scan};
