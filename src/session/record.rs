//! Flat key/value encoding of a session.
//!
//! Each session field is stored under its own key so the record can be
//! inspected and patched field by field. The session is still written as one
//! unit inside the tick lock.

use super::{Difficulty, MoveLog, Session, SessionToken};
use crate::db::DbError;
use crate::transport::ThreadHandle;
use postal_chess_notation::Side;
use std::collections::HashMap;
use std::str::FromStr;
use strum::IntoEnumIterator;
use tracing::{debug, instrument, warn};

/// Storage key of each session field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::AsRefStr, strum::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum SessionKey {
    /// Current FEN.
    Position,
    /// JSON-encoded move log.
    MoveLog,
    /// Whether moves are accepted.
    Active,
    /// Whether turn-taking is suspended.
    Paused,
    /// Round counter for move numbering.
    TurnNumber,
    /// Side the human plays.
    HumanSide,
    /// Opponent strength.
    Difficulty,
    /// Bound conversation, empty until located.
    ThreadHandle,
    /// Events already consumed from the thread.
    Cursor,
    /// Token embedded in outbound subjects.
    SessionToken,
}

impl Session {
    /// Encodes every field as a key/value pair.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the move log cannot be serialized.
    #[instrument(skip(self), fields(session_token = %self.session_token()))]
    pub fn to_record(&self) -> Result<Vec<(String, String)>, DbError> {
        let move_log = serde_json::to_string(self.move_log())
            .map_err(|e| DbError::new(format!("Failed to encode move log: {}", e)))?;

        let entries = SessionKey::iter()
            .map(|key| {
                let value = match key {
                    SessionKey::Position => self.position().clone(),
                    SessionKey::MoveLog => move_log.clone(),
                    SessionKey::Active => self.active().to_string(),
                    SessionKey::Paused => self.paused().to_string(),
                    SessionKey::TurnNumber => self.turn_number().to_string(),
                    SessionKey::HumanSide => self.human_side().to_string(),
                    SessionKey::Difficulty => self.difficulty().to_string(),
                    SessionKey::ThreadHandle => self
                        .thread_handle()
                        .as_ref()
                        .map(|h| h.to_string())
                        .unwrap_or_default(),
                    SessionKey::Cursor => self.cursor().to_string(),
                    SessionKey::SessionToken => self.session_token().to_string(),
                };
                (key.as_ref().to_string(), value)
            })
            .collect();

        Ok(entries)
    }

    /// Decodes a session from stored fields.
    ///
    /// Returns `Ok(None)` when no session field is stored at all.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] when the record is partial or a field fails to parse.
    #[instrument(skip(fields), fields(count = fields.len()))]
    pub fn from_record(fields: &HashMap<String, String>) -> Result<Option<Self>, DbError> {
        let present = SessionKey::iter()
            .filter(|k| fields.contains_key(k.as_ref()))
            .count();
        if present == 0 {
            debug!("No stored session");
            return Ok(None);
        }

        let get = |key: SessionKey| -> Result<&str, DbError> {
            fields.get(key.as_ref()).map(String::as_str).ok_or_else(|| {
                warn!(key = %key, "Stored session is missing a field");
                DbError::new(format!("Stored session is missing '{}'", key))
            })
        };

        let position = get(SessionKey::Position)?.to_string();
        let move_log: MoveLog = serde_json::from_str(get(SessionKey::MoveLog)?)
            .map_err(|e| DbError::new(format!("Invalid move log: {}", e)))?;
        let active = parse_field::<bool>(SessionKey::Active, get(SessionKey::Active)?)?;
        let paused = parse_field::<bool>(SessionKey::Paused, get(SessionKey::Paused)?)?;
        let turn_number = parse_field::<u32>(SessionKey::TurnNumber, get(SessionKey::TurnNumber)?)?;
        let human_side = parse_field::<Side>(SessionKey::HumanSide, get(SessionKey::HumanSide)?)?;
        let difficulty =
            parse_field::<Difficulty>(SessionKey::Difficulty, get(SessionKey::Difficulty)?)?;
        let thread_handle = match get(SessionKey::ThreadHandle)? {
            "" => None,
            handle => Some(ThreadHandle::new(handle)),
        };
        let cursor = parse_field::<usize>(SessionKey::Cursor, get(SessionKey::Cursor)?)?;
        let session_token = SessionToken::from_stored(get(SessionKey::SessionToken)?.to_string());

        Ok(Some(Session::from_parts(
            position,
            move_log,
            active,
            paused,
            turn_number,
            human_side,
            difficulty,
            thread_handle,
            cursor,
            session_token,
        )))
    }
}

fn parse_field<T: FromStr>(key: SessionKey, raw: &str) -> Result<T, DbError> {
    raw.parse::<T>()
        .map_err(|_| DbError::new(format!("Invalid value '{}' for '{}'", raw, key)))
}
