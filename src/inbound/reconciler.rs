//! Cursor-based scan of a conversation for the next actionable message.
//!
//! The scan is pure: it decides the new cursor and at most one intent to
//! dispatch. The caller persists the cursor before acting on the intent, so a
//! message is never acted on twice even if dispatch fails half way.

use super::classify::{Intent, classify};
use super::fresh_text::fresh_text;
use crate::auth::is_authorized;
use crate::transport::InboundEvent;
use tracing::{debug, info, instrument, warn};

/// An intent chosen for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Thread position of the message.
    pub sequence_index: usize,
    /// What it asks for.
    pub intent: Intent,
}

/// Outcome of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Cursor to persist before dispatching.
    pub cursor: usize,
    /// The one message to act on, if any.
    pub dispatch: Option<Dispatch>,
}

impl ScanOutcome {
    /// True when the cursor moved.
    pub fn advanced_from(&self, previous: usize) -> bool {
        self.cursor > previous
    }
}

/// Finds the first actionable message at or after `cursor`.
///
/// Messages from anyone but `authorized`, messages starting with one of
/// `outbound_prefixes`, and unrecognized messages are passed over. The cursor
/// stops just past the chosen message, or at the end when none is chosen.
#[instrument(skip(events, authorized, outbound_prefixes), fields(events = events.len()))]
pub fn scan(
    events: &[InboundEvent],
    cursor: usize,
    authorized: &str,
    outbound_prefixes: &[&str],
) -> ScanOutcome {
    if events.len() <= cursor {
        debug!("No new messages");
        return ScanOutcome {
            cursor,
            dispatch: None,
        };
    }

    for (index, event) in events.iter().enumerate().skip(cursor) {
        if !is_authorized(authorized, event.sender()) {
            warn!(index, sender = %event.sender(), "Ignoring message from unauthorized sender");
            continue;
        }

        let fresh = fresh_text(event.raw_body());
        if fresh.is_empty() {
            debug!(index, "Message has no fresh text");
            continue;
        }
        if outbound_prefixes.iter().any(|p| fresh.starts_with(p)) {
            debug!(index, "Skipping echo of an outbound message");
            continue;
        }

        let intent = classify(&fresh);
        if intent.is_actionable() {
            info!(index, ?intent, "Actionable message found");
            return ScanOutcome {
                cursor: index + 1,
                dispatch: Some(Dispatch {
                    sequence_index: index,
                    intent,
                }),
            };
        }
        debug!(index, "Unrecognized message skipped");
    }

    ScanOutcome {
        cursor: events.len(),
        dispatch: None,
    }
}
