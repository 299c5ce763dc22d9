//! The single game session and its derived turn state.

mod model;
mod record;
mod state;

pub use model::{Difficulty, MoveLog, Session, SessionToken};
pub use record::SessionKey;
pub use state::TurnState;
