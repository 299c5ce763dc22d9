//! Session store: a flat key/value record of the one live session.

mod error;
mod memory;
mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only
mod store;

pub use error::DbError;
pub use memory::MemorySessionStore;
pub use models::{NewSessionField, SessionField};
pub use repository::SqliteSessionStore;
pub use store::SessionStore;
