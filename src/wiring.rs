//! Builds the service from configuration.

use crate::commentary::{CommentarySource, LlmCommentary};
use crate::config::{ConfigError, GameConfig, OpponentKind};
use crate::db::{SessionStore, SqliteSessionStore};
use crate::llm_client::{LlmClient, TextGenerator};
use crate::lock::TickLock;
use crate::opponent::{EngineMoveSource, LlmMoveSource, MoveSource};
use crate::oracle::LlmOracle;
use crate::rate_limit::RateLimiter;
use crate::service::CorrespondenceService;
use crate::transport::{GmailTransport, MailTransport, Notifier};
use crate::turn::{NewGameSettings, TurnMachine};
use std::sync::Arc;
use tracing::{info, instrument};

/// The assembled service and the collaborators preflight probes.
#[derive(Clone)]
pub struct Wiring {
    /// The service.
    pub service: CorrespondenceService,
    /// Mail transport in use.
    pub transport: Arc<dyn MailTransport>,
    /// Opponent move source in use.
    pub move_source: Arc<dyn MoveSource>,
}

/// Opens the configured session store.
pub fn session_store(config: &GameConfig) -> Arc<dyn SessionStore> {
    Arc::new(SqliteSessionStore::new(config.db_path().clone()))
}

/// Builds every collaborator from `config` and the environment.
///
/// # Errors
///
/// Returns [`ConfigError`] when a secret is missing or a client cannot be built.
#[instrument(skip(config), fields(opponent = %config.opponent()))]
pub fn build(config: &GameConfig) -> Result<Wiring, ConfigError> {
    config.validate()?;
    let store = session_store(config);

    let client =
        LlmClient::new(config.create_llm_config()?).map_err(|e| ConfigError::new(e.message))?;
    let generator: Arc<dyn TextGenerator> = Arc::new(client);
    let oracle = Arc::new(LlmOracle::new(generator.clone()));

    let move_source: Arc<dyn MoveSource> = match config.opponent() {
        OpponentKind::Engine => Arc::new(
            EngineMoveSource::new(config.engine_url(), config.request_timeout())
                .map_err(|e| ConfigError::new(e.message))?,
        ),
        OpponentKind::Llm => Arc::new(LlmMoveSource::new(generator.clone())),
    };
    let commentary: Option<Arc<dyn CommentarySource>> = if *config.commentary() {
        Some(Arc::new(LlmCommentary::new(generator)))
    } else {
        None
    };

    let transport: Arc<dyn MailTransport> = Arc::new(
        GmailTransport::new(config.gmail_access_token()?, config.request_timeout())
            .map_err(|e| ConfigError::new(e.message))?,
    );
    let notifier = Notifier::new(
        transport.clone(),
        config.player_email().clone(),
        config.label().clone(),
        *config.archive_after_send(),
        config.locate_retry_delay(),
    );

    let machine = TurnMachine::new(
        oracle,
        move_source.clone(),
        commentary,
        store.clone(),
        RateLimiter::new(store.clone(), config.min_call_spacing()),
        NewGameSettings::new(
            *config.human_side(),
            *config.difficulty(),
            *config.move_log_cap(),
        ),
    );
    let lock = TickLock::new(config.lock_path(), config.lock_wait());

    let service = CorrespondenceService::new(
        store,
        lock,
        transport.clone(),
        notifier,
        machine,
        config.player_email().clone(),
    );
    info!("Service assembled");
    Ok(Wiring {
        service,
        transport,
        move_source,
    })
}
