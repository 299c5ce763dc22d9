//! Deployment configuration.

use crate::auth::address_of;
use crate::llm_client::{LlmConfig, LlmProvider};
use crate::session::Difficulty;
use derive_getters::Getters;
use derive_more::{Display, Error};
use postal_chess_notation::Side;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Environment variable holding the Gmail OAuth access token.
pub const GMAIL_TOKEN_VAR: &str = "GMAIL_ACCESS_TOKEN";

/// Which move source plays the opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OpponentKind {
    /// HTTP chess engine.
    Engine,
    /// Language model.
    Llm,
}

/// Everything one deployment needs, read from a TOML file.
///
/// Secrets are never stored here; they come from the environment.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct GameConfig {
    /// The only address whose messages are acted on.
    player_email: String,

    /// SQLite database holding the session.
    #[serde(default = "default_db_path")]
    db_path: String,

    /// File used for the tick lock.
    #[serde(default = "default_lock_path")]
    lock_path: String,

    /// Longest wait for the tick lock.
    #[serde(default = "default_lock_wait_secs")]
    lock_wait_secs: u64,

    /// Side the player takes in new games.
    #[serde(default = "default_human_side")]
    human_side: Side,

    /// Opponent strength for new games.
    #[serde(default = "default_difficulty")]
    difficulty: Difficulty,

    /// Move source for the opponent.
    #[serde(default = "default_opponent")]
    opponent: OpponentKind,

    /// Chess engine endpoint.
    #[serde(default = "default_engine_url")]
    engine_url: String,

    /// LLM provider for validation, generative play and commentary.
    #[serde(default = "default_provider")]
    llm_provider: LlmProvider,

    /// LLM model name.
    #[serde(default = "default_model")]
    llm_model: String,

    /// Maximum tokens for LLM responses.
    #[serde(default = "default_max_tokens")]
    llm_max_tokens: u32,

    /// Whether to add coaching commentary.
    #[serde(default = "default_true")]
    commentary: bool,

    /// Timeout for every outbound network call.
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,

    /// Minimum spacing between validations of player moves.
    #[serde(default = "default_min_call_spacing_secs")]
    min_call_spacing_secs: u64,

    /// Label added to the game thread.
    #[serde(default = "default_label")]
    label: Option<String>,

    /// Remove the thread from the inbox after each send.
    #[serde(default)]
    archive_after_send: bool,

    /// Most move-log entries retained.
    #[serde(default = "default_move_log_cap")]
    move_log_cap: usize,

    /// Wait before searching again for a freshly sent thread.
    #[serde(default = "default_locate_retry_delay_secs")]
    locate_retry_delay_secs: u64,

    /// Interval between ticks for `watch` and installed triggers.
    #[serde(default = "default_poll_interval_minutes")]
    poll_interval_minutes: u32,
}

fn default_db_path() -> String {
    "postal_chess.db".to_string()
}

fn default_lock_path() -> String {
    "postal_chess.lock".to_string()
}

fn default_lock_wait_secs() -> u64 {
    30
}

fn default_human_side() -> Side {
    Side::White
}

fn default_difficulty() -> Difficulty {
    Difficulty::Intermediate
}

fn default_opponent() -> OpponentKind {
    OpponentKind::Engine
}

fn default_engine_url() -> String {
    "https://chess-api.com/v1".to_string()
}

#[instrument]
fn default_provider() -> LlmProvider {
    LlmProvider::Anthropic
}

#[instrument]
fn default_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

#[instrument]
fn default_max_tokens() -> u32 {
    1024
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_min_call_spacing_secs() -> u64 {
    5
}

fn default_label() -> Option<String> {
    Some("Chess".to_string())
}

fn default_move_log_cap() -> usize {
    400
}

fn default_locate_retry_delay_secs() -> u64 {
    3
}

fn default_poll_interval_minutes() -> u32 {
    5
}

impl GameConfig {
    /// Creates a configuration with defaults for everything but the player.
    #[instrument]
    pub fn new(player_email: String) -> Self {
        Self {
            player_email,
            db_path: default_db_path(),
            lock_path: default_lock_path(),
            lock_wait_secs: default_lock_wait_secs(),
            human_side: default_human_side(),
            difficulty: default_difficulty(),
            opponent: default_opponent(),
            engine_url: default_engine_url(),
            llm_provider: default_provider(),
            llm_model: default_model(),
            llm_max_tokens: default_max_tokens(),
            commentary: default_true(),
            request_timeout_secs: default_request_timeout_secs(),
            min_call_spacing_secs: default_min_call_spacing_secs(),
            label: default_label(),
            archive_after_send: false,
            move_log_cap: default_move_log_cap(),
            locate_retry_delay_secs: default_locate_retry_delay_secs(),
            poll_interval_minutes: default_poll_interval_minutes(),
        }
    }

    /// Loads and validates configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml(&content)?;
        info!(player = %config.player_email, opponent = %config.opponent, "Config loaded successfully");
        Ok(config)
    }

    /// Parses and validates configuration text.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings no deployment can run with.
    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let address = address_of(&self.player_email);
        if address.is_empty() || !address.contains('@') || address.contains(char::is_whitespace) {
            return Err(ConfigError::new(format!(
                "player_email '{}' is not an email address",
                self.player_email
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::new("request_timeout_secs must be positive"));
        }
        if self.lock_wait_secs == 0 {
            return Err(ConfigError::new("lock_wait_secs must be positive"));
        }
        if self.move_log_cap == 0 {
            return Err(ConfigError::new("move_log_cap must be positive"));
        }
        if self.poll_interval_minutes == 0 {
            return Err(ConfigError::new("poll_interval_minutes must be positive"));
        }
        if self.opponent == OpponentKind::Engine {
            reqwest::Url::parse(&self.engine_url).map_err(|e| {
                ConfigError::new(format!("engine_url '{}' is invalid: {}", self.engine_url, e))
            })?;
        }
        debug!("Config valid");
        Ok(())
    }

    /// Timeout for network calls.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Longest wait for the tick lock.
    pub fn lock_wait(&self) -> Duration {
        Duration::from_secs(self.lock_wait_secs)
    }

    /// Delay before the second thread search.
    pub fn locate_retry_delay(&self) -> Duration {
        Duration::from_secs(self.locate_retry_delay_secs)
    }

    /// Minimum spacing between player-move validations.
    pub fn min_call_spacing(&self) -> chrono::Duration {
        i64::try_from(self.min_call_spacing_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Name of the environment variable holding the LLM key.
    pub fn llm_key_var(&self) -> &'static str {
        match self.llm_provider {
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Creates LLM configuration, reading the key from the environment.
    #[instrument(skip(self), fields(provider = ?self.llm_provider, model = %self.llm_model))]
    pub fn create_llm_config(&self) -> Result<LlmConfig, ConfigError> {
        debug!("Creating LLM config");
        let var = self.llm_key_var();
        let api_key = std::env::var(var)
            .map_err(|_| ConfigError::new(format!("{} environment variable not set", var)))?;
        Ok(LlmConfig::new(
            self.llm_provider,
            api_key,
            self.llm_model.clone(),
            self.llm_max_tokens,
            self.request_timeout(),
        ))
    }

    /// Reads the Gmail access token from the environment.
    #[instrument(skip(self))]
    pub fn gmail_access_token(&self) -> Result<String, ConfigError> {
        std::env::var(GMAIL_TOKEN_VAR)
            .map_err(|_| ConfigError::new(format!("{} environment variable not set", GMAIL_TOKEN_VAR)))
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let message = message.into();
        error!(error_message = %message, "Config error created");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
