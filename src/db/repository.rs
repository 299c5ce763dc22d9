//! SQLite-backed session store.

use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use crate::db::{DbError, NewSessionField, SessionField, SessionStore, schema};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Session store persisted in a SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    db_path: String,
}

impl SqliteSessionStore {
    /// Creates a store for the database at the given path.
    ///
    /// The file is created on first connection; call
    /// [`SessionStore::initialize`] before first use.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String) -> Self {
        info!(path = %db_path, "Creating SqliteSessionStore");
        Self { db_path }
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        SqliteConnection::establish(&self.db_path)
            .map_err(|e| DbError::new(format!("Failed to connect to '{}': {}", self.db_path, e)))
    }
}

impl SessionStore for SqliteSessionStore {
    #[instrument(skip(self))]
    fn initialize(&self) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(format!("Migrations failed: {}", e)))?;
        info!(applied = applied.len(), "Storage initialized");
        Ok(())
    }

    #[instrument(skip(self))]
    fn get(&self, key: &str) -> Result<Option<String>, DbError> {
        let mut conn = self.connection()?;
        let field = schema::session_fields::table
            .filter(schema::session_fields::key.eq(key))
            .select(SessionField::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(field.map(|f| f.value().clone()))
    }

    #[instrument(skip(self))]
    fn get_all(&self) -> Result<HashMap<String, String>, DbError> {
        let mut conn = self.connection()?;
        let fields = schema::session_fields::table
            .select(SessionField::as_select())
            .load(&mut conn)?;
        debug!(count = fields.len(), "Loaded stored fields");
        Ok(fields
            .into_iter()
            .map(|f| (f.key().clone(), f.value().clone()))
            .collect())
    }

    #[instrument(skip(self, value))]
    fn put(&self, key: &str, value: &str) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        diesel::replace_into(schema::session_fields::table)
            .values(&NewSessionField::new(key.to_string(), value.to_string()))
            .execute(&mut conn)?;
        Ok(())
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    fn put_all(&self, entries: &[(String, String)]) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        conn.transaction::<_, DbError, _>(|conn| {
            for (key, value) in entries {
                diesel::replace_into(schema::session_fields::table)
                    .values(&NewSessionField::new(key.clone(), value.clone()))
                    .execute(conn)?;
            }
            Ok(())
        })?;
        debug!("Fields written");
        Ok(())
    }
}
