//! In-memory session store for tests and dry runs.

use crate::db::{DbError, SessionStore};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Session store held in process memory.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    fields: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn fields(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, DbError> {
        self.fields
            .lock()
            .map_err(|_| DbError::new("Memory store mutex poisoned"))
    }
}

impl SessionStore for MemorySessionStore {
    fn initialize(&self) -> Result<(), DbError> {
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, DbError> {
        Ok(self.fields()?.get(key).cloned())
    }

    fn get_all(&self) -> Result<HashMap<String, String>, DbError> {
        Ok(self.fields()?.clone())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.fields()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn put_all(&self, entries: &[(String, String)]) -> Result<(), DbError> {
        let mut fields = self.fields()?;
        for (key, value) in entries {
            fields.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
