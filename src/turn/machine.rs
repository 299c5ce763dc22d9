//! Applies player intents to the session.

use crate::commentary::CommentarySource;
use crate::db::SessionStore;
use crate::error::{OpponentFailure, TickError};
use crate::inbound::{Command, Intent};
use crate::lock::TickLockGuard;
use crate::opponent::MoveSource;
use crate::oracle::{OracleVerdict, PositionOracle, Terminal};
use crate::rate_limit::{Admission, RateLimiter};
use crate::render::Notification;
use crate::session::{Difficulty, Session, TurnState};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_new::new;
use postal_chess_notation::{Side, is_lexically_valid};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Rate-limit key for player move validation.
const ORACLE_DEPENDENCY: &str = "oracle";
/// Rate-limit key for commentary.
const COMMENTARY_DEPENDENCY: &str = "commentary";

/// Parameters fixed when a new session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, new)]
pub struct NewGameSettings {
    /// Side the player takes.
    human_side: Side,
    /// Opponent strength.
    difficulty: Difficulty,
    /// Most move-log entries retained.
    move_log_cap: usize,
}

/// The opponent's half of a turn, once adopted.
#[derive(Debug, Clone)]
struct OpponentMove {
    notation: String,
    annotated: String,
    evaluation: Option<String>,
    terminal: Option<Terminal>,
}

/// Turn state machine over the session.
///
/// Every method takes the tick lock guard: the session is only read and
/// written while it is held.
#[derive(Clone)]
pub struct TurnMachine {
    oracle: Arc<dyn PositionOracle>,
    move_source: Arc<dyn MoveSource>,
    commentary: Option<Arc<dyn CommentarySource>>,
    store: Arc<dyn SessionStore>,
    limiter: RateLimiter,
    settings: NewGameSettings,
}

impl TurnMachine {
    /// Creates a machine over its collaborators.
    pub fn new(
        oracle: Arc<dyn PositionOracle>,
        move_source: Arc<dyn MoveSource>,
        commentary: Option<Arc<dyn CommentarySource>>,
        store: Arc<dyn SessionStore>,
        limiter: RateLimiter,
        settings: NewGameSettings,
    ) -> Self {
        Self {
            oracle,
            move_source,
            commentary,
            store,
            limiter,
            settings,
        }
    }

    /// Settings used for new sessions.
    pub fn settings(&self) -> &NewGameSettings {
        &self.settings
    }

    /// Writes the session after checking its position.
    #[instrument(skip(self, _guard, session), fields(session_token = %session.session_token()))]
    pub fn commit(&self, _guard: &TickLockGuard, session: &Session) -> Result<(), TickError> {
        if !self.oracle.is_well_formed(session.position()) {
            return Err(TickError::CorruptPosition {
                position: session.position().clone(),
            });
        }
        self.store.save_session(session)?;
        debug!(cursor = session.cursor(), "Session committed");
        Ok(())
    }

    /// Replaces whatever session exists with a fresh one and opens it.
    ///
    /// The fresh session is committed before the opponent is asked for an
    /// opening move, so a failing opponent leaves a stalled new game rather
    /// than the old one.
    #[instrument(skip(self, guard))]
    pub async fn start(&self, guard: &TickLockGuard) -> Result<(Session, Notification), TickError> {
        let mut session = Session::new(
            self.settings.human_side,
            self.settings.difficulty,
            self.settings.move_log_cap,
        );
        self.commit(guard, &session)?;

        let notification = match TurnState::of(&session) {
            TurnState::AwaitingOpponentMove => {
                let opening = self.opponent_turn(guard, &mut session).await?;
                Notification::GameStarted {
                    opening: Some(opening.annotated),
                    evaluation: opening.evaluation,
                }
            }
            _ => Notification::GameStarted {
                opening: None,
                evaluation: None,
            },
        };
        Ok((session, notification))
    }

    /// Applies one classified intent, returning what to tell the player.
    ///
    /// `NEW` replaces `session` outright. Unrecognized intents change nothing
    /// and produce no notification.
    #[instrument(skip(self, guard, session, now), fields(session_token = %session.session_token(), state = %TurnState::of(session)))]
    pub async fn apply(
        &self,
        guard: &TickLockGuard,
        session: &mut Session,
        intent: Intent,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>, TickError> {
        let state = TurnState::of(session);
        let notification = match (state, intent) {
            (_, Intent::Command(Command::New)) => {
                info!("Player asked for a new game");
                let (fresh, notification) = self.start(guard).await?;
                *session = fresh;
                notification
            }
            (_, Intent::Unrecognized) => {
                debug!("Nothing to apply");
                return Ok(None);
            }
            (TurnState::Ended, _) => Notification::NoActiveGame,
            (_, Intent::Command(Command::Resign)) => {
                session.end();
                self.commit(guard, session)?;
                info!("Player resigned");
                Notification::Resigned
            }
            (TurnState::Paused, Intent::Command(Command::Pause)) => Notification::AlreadyPaused,
            (_, Intent::Command(Command::Pause)) => {
                session.set_paused(true);
                self.commit(guard, session)?;
                Notification::Paused
            }
            (TurnState::Paused, Intent::Command(Command::Continue)) => {
                session.set_paused(false);
                self.commit(guard, session)?;
                match TurnState::of(session) {
                    TurnState::AwaitingOpponentMove => self.retry_opponent(guard, session).await?,
                    _ => Notification::Resumed,
                }
            }
            (TurnState::AwaitingOpponentMove, Intent::Command(Command::Continue)) => {
                self.retry_opponent(guard, session).await?
            }
            (_, Intent::Command(Command::Continue)) => Notification::NotPaused,
            (TurnState::Paused, Intent::MoveAttempt(token)) => {
                Notification::PausedReminder { token }
            }
            (TurnState::AwaitingOpponentMove, Intent::MoveAttempt(_)) => {
                Notification::AwaitingOpponent
            }
            (TurnState::AwaitingPlayerMove, Intent::MoveAttempt(token)) => {
                self.ingest(guard, session, token, now).await?
            }
        };
        Ok(Some(notification))
    }

    /// What a stalled session still owes the player, if anything.
    ///
    /// An owed opponent move is played. A game whose opening message never
    /// reached a thread gets that message again.
    #[instrument(skip(self, guard, session), fields(session_token = %session.session_token()))]
    pub async fn resume(
        &self,
        guard: &TickLockGuard,
        session: &mut Session,
    ) -> Result<Option<Notification>, TickError> {
        match TurnState::of(session) {
            TurnState::AwaitingOpponentMove => {
                Ok(Some(self.retry_opponent(guard, session).await?))
            }
            TurnState::AwaitingPlayerMove if session.thread_handle().is_none() => {
                info!("Resending opening message");
                let opening = if session.human_side().is_first_mover() {
                    None
                } else {
                    session.move_log().entries().first().cloned()
                };
                Ok(Some(Notification::GameStarted {
                    opening,
                    evaluation: None,
                }))
            }
            state => {
                info!(%state, "Nothing to resume");
                Ok(None)
            }
        }
    }

    async fn retry_opponent(
        &self,
        guard: &TickLockGuard,
        session: &mut Session,
    ) -> Result<Notification, TickError> {
        info!("Retrying stalled opponent move");
        let opening = session.move_log().is_empty();
        let reply = self.opponent_turn(guard, session).await?;
        if opening {
            return Ok(Notification::GameStarted {
                opening: Some(reply.annotated),
                evaluation: reply.evaluation,
            });
        }
        Ok(Notification::OpponentMoved {
            player_move: None,
            opponent_move: reply.annotated,
            evaluation: reply.evaluation,
            commentary: String::new(),
            result: reply.terminal,
        })
    }

    /// Validates and plays the player's move, then the opponent's reply.
    #[instrument(skip(self, guard, session, now), fields(token = %token))]
    async fn ingest(
        &self,
        guard: &TickLockGuard,
        session: &mut Session,
        token: String,
        now: DateTime<Utc>,
    ) -> Result<Notification, TickError> {
        if !is_lexically_valid(&token) {
            info!("Move rejected by the lexical gate");
            return Ok(Notification::FormatRejected { token });
        }

        if let Admission::Limited { retry_after } =
            self.limiter.admit(guard, ORACLE_DEPENDENCY, now)?
        {
            let whole = retry_after.num_seconds();
            let retry_after_secs = if retry_after > chrono::Duration::seconds(whole) {
                whole + 1
            } else {
                whole
            };
            return Ok(Notification::RateLimited {
                token,
                retry_after_secs,
            });
        }

        let verdict = self
            .oracle
            .validate_and_apply(session.position(), &session.move_log().render(), &token)
            .await?;
        let (new_position, notation, terminal) = match verdict {
            OracleVerdict::Illegal {
                reason,
                alternatives,
            } => {
                info!(%reason, "Move rejected by the oracle");
                return Ok(Notification::IllegalMove {
                    token,
                    reason,
                    alternatives,
                });
            }
            OracleVerdict::Legal {
                new_position,
                notation,
                terminal,
            } => (new_position, notation, terminal),
        };

        let player_move = self.adopt(guard, session, notation.clone(), new_position, terminal)?;
        if let Some(result) = terminal {
            info!(result = %result.describe(), "Player's move ended the game");
            return Ok(Notification::GameOver {
                player_move,
                result,
            });
        }

        let reply = self.opponent_turn(guard, session).await?;
        let commentary = self
            .commentary_for(guard, session, &notation, &reply.notation, now)
            .await;

        Ok(Notification::OpponentMoved {
            player_move: Some(player_move),
            opponent_move: reply.annotated,
            evaluation: reply.evaluation,
            commentary,
            result: reply.terminal,
        })
    }

    /// Records a legal move for the side to move and commits it.
    fn adopt(
        &self,
        guard: &TickLockGuard,
        session: &mut Session,
        notation: String,
        new_position: String,
        terminal: Option<Terminal>,
    ) -> Result<String, TickError> {
        if !self.oracle.is_well_formed(&new_position) {
            return Err(TickError::CorruptPosition {
                position: new_position,
            });
        }
        let mover = session.side_to_move();
        let annotated = session.annotate(mover, &notation);
        session.record_move(mover, &notation, new_position);
        if terminal.is_some() {
            session.end();
        }
        self.commit(guard, session)?;
        Ok(annotated)
    }

    /// Asks the move source for a reply and adopts it only if the oracle agrees.
    #[instrument(skip(self, guard, session), fields(session_token = %session.session_token()))]
    async fn opponent_turn(
        &self,
        guard: &TickLockGuard,
        session: &mut Session,
    ) -> Result<OpponentMove, TickError> {
        let result = self.propose_and_verify(session).await;
        let (notation, new_position, terminal, evaluation) = match result {
            Ok(adopted) => adopted,
            Err(failure) => {
                error!(operator_attention = true, error = %failure, "Opponent reply failed; player's move is saved without an answer");
                return Err(TickError::Opponent(failure));
            }
        };
        let annotated = self.adopt(guard, session, notation.clone(), new_position, terminal)?;
        info!(opponent_move = %annotated, "Opponent moved");
        Ok(OpponentMove {
            notation,
            annotated,
            evaluation,
            terminal,
        })
    }

    async fn propose_and_verify(
        &self,
        session: &Session,
    ) -> Result<(String, String, Option<Terminal>, Option<String>), OpponentFailure> {
        let proposal = self
            .move_source
            .propose(session.position(), *session.difficulty())
            .await
            .map_err(OpponentFailure::Unavailable)?;
        let token = proposal.token().clone();
        debug!(%token, "Verifying opponent proposal");

        let verdict = self
            .oracle
            .validate_and_apply(session.position(), &session.move_log().render(), &token)
            .await
            .map_err(|source| OpponentFailure::Unverifiable {
                token: token.clone(),
                source,
            })?;
        match verdict {
            OracleVerdict::Illegal { reason, .. } => Err(OpponentFailure::Rejected { token, reason }),
            OracleVerdict::Legal {
                new_position,
                notation,
                terminal,
            } => Ok((notation, new_position, terminal, proposal.evaluation().clone())),
        }
    }

    /// Best-effort commentary; any failure yields empty text.
    async fn commentary_for(
        &self,
        guard: &TickLockGuard,
        session: &Session,
        player_move: &str,
        opponent_move: &str,
        now: DateTime<Utc>,
    ) -> String {
        let Some(source) = &self.commentary else {
            return String::new();
        };
        match self.limiter.admit(guard, COMMENTARY_DEPENDENCY, now) {
            Ok(Admission::Allowed) => {}
            Ok(Admission::Limited { .. }) => return String::new(),
            Err(e) => {
                warn!(error = %e, "Skipping commentary");
                return String::new();
            }
        }
        match source
            .explain(
                session.position(),
                &session.move_log().render(),
                player_move,
                opponent_move,
                *session.difficulty(),
            )
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Commentary unavailable");
                String::new()
            }
        }
    }
}
