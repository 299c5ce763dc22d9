//! Postal Chess library - correspondence chess over email
//!
//! One game at a time is played against an automated opponent through an
//! email thread polled on a timer.
//!
//! # Architecture
//!
//! - **Reconciler**: scans the thread past a persisted cursor and picks at
//!   most one actionable message per tick
//! - **Turn machine**: applies commands and moves to the session, checking
//!   every move (the player's and the opponent's) with the position oracle
//! - **Session store**: flat key/value record of the one live session
//! - **Collaborators**: LLM oracle, engine or LLM opponent, commentary, Gmail
//!
//! # Example
//!
//! ```no_run
//! use postal_chess::{GameConfig, wiring};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = GameConfig::from_file("postal_chess.toml")?;
//! let wiring = wiring::build(&config)?;
//! let outcome = wiring.service.tick().await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod auth;
mod commentary;
mod config;
mod db;
mod error;
mod inbound;
mod llm_client;
mod llm_response;
mod lock;
mod opponent;
mod oracle;
mod rate_limit;
mod render;
mod service;
mod session;
mod transport;
mod turn;

// Operator entry points
pub mod preflight;
pub mod trigger;
pub mod wiring;

// Crate-level exports - Configuration
pub use config::{ConfigError, GMAIL_TOKEN_VAR, GameConfig, OpponentKind};

// Crate-level exports - Errors
pub use error::{OpponentFailure, TickError};

// Crate-level exports - Session and storage
pub use db::{DbError, MemorySessionStore, SessionStore, SqliteSessionStore};
pub use session::{Difficulty, MoveLog, Session, SessionKey, SessionToken, TurnState};

// Crate-level exports - Reconciliation and turns
pub use auth::{address_of, is_authorized};
pub use inbound::{Command, Dispatch, Intent, ScanOutcome, classify, fresh_text, scan};
pub use lock::{LockError, TickLock, TickLockGuard};
pub use rate_limit::{Admission, RateLimiter};
pub use service::{CorrespondenceService, TickOutcome};
pub use turn::{NewGameSettings, TurnMachine};

// Crate-level exports - Notifications
pub use render::{Notification, OUTBOUND_PREFIX, OUTBOUND_PREFIXES, RenderedMessage, render, subject_for};

// Crate-level exports - External collaborators
pub use commentary::{CommentarySource, LlmCommentary};
pub use llm_client::{LlmClient, LlmConfig, LlmError, LlmProvider, TextGenerator};
pub use llm_response::{Parsed, parse_reply};
pub use opponent::{EngineMoveSource, LlmMoveSource, MoveSource, MoveSourceError, Proposal};
pub use oracle::{
    LlmOracle, MAX_ALTERNATIVES, OracleError, OracleVerdict, PositionOracle, Terminal, TerminalKind,
};
pub use transport::{GmailTransport, InboundEvent, MailTransport, Notifier, ThreadHandle, TransportError};
