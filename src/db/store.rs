//! The session store seam.

use crate::db::DbError;
use crate::session::Session;
use std::collections::HashMap;
use tracing::instrument;

/// Durable key/value record with plain read-then-write semantics.
///
/// The store gives no isolation of its own: callers hold the tick lock for
/// the whole read-modify-write.
pub trait SessionStore: Send + Sync {
    /// Prepares the backing storage (creates tables).
    fn initialize(&self) -> Result<(), DbError>;

    /// Reads one value.
    fn get(&self, key: &str) -> Result<Option<String>, DbError>;

    /// Reads every stored value.
    fn get_all(&self) -> Result<HashMap<String, String>, DbError>;

    /// Writes one value.
    fn put(&self, key: &str, value: &str) -> Result<(), DbError>;

    /// Writes several values in one transaction.
    fn put_all(&self, entries: &[(String, String)]) -> Result<(), DbError>;

    /// Loads the live session, if one was ever created.
    #[instrument(skip(self))]
    fn load_session(&self) -> Result<Option<Session>, DbError> {
        Session::from_record(&self.get_all()?)
    }

    /// Writes every session field.
    #[instrument(skip(self, session), fields(session_token = %session.session_token()))]
    fn save_session(&self, session: &Session) -> Result<(), DbError> {
        self.put_all(&session.to_record()?)
    }
}
