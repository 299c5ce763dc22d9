//! Locked entry points: tick, new game, resume.

use crate::db::SessionStore;
use crate::error::TickError;
use crate::inbound::scan;
use crate::lock::{TickLock, TickLockGuard};
use crate::render::{Notification, OUTBOUND_PREFIXES, render};
use crate::session::Session;
use crate::transport::{MailTransport, Notifier, ThreadHandle};
use crate::turn::TurnMachine;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No session has ever been created.
    NoSession,
    /// The session has no conversation yet.
    NoThread,
    /// No message past the cursor.
    NothingNew,
    /// New messages were all passed over; the cursor moved to `cursor`.
    Skipped {
        /// Persisted cursor.
        cursor: usize,
    },
    /// One message was acted on.
    Dispatched {
        /// Thread position of the message.
        sequence_index: usize,
        /// Whether the player was sent a reply.
        notified: bool,
    },
}

/// The correspondence game service.
///
/// Every state-mutating entry point takes the tick lock for its whole run.
#[derive(Clone)]
pub struct CorrespondenceService {
    store: Arc<dyn SessionStore>,
    lock: TickLock,
    transport: Arc<dyn MailTransport>,
    notifier: Notifier,
    machine: TurnMachine,
    player_email: String,
}

impl CorrespondenceService {
    /// Assembles the service.
    pub fn new(
        store: Arc<dyn SessionStore>,
        lock: TickLock,
        transport: Arc<dyn MailTransport>,
        notifier: Notifier,
        machine: TurnMachine,
        player_email: String,
    ) -> Self {
        Self {
            store,
            lock,
            transport,
            notifier,
            machine,
            player_email,
        }
    }

    /// Prepares storage.
    #[instrument(skip(self))]
    pub fn initialize_storage(&self) -> Result<(), TickError> {
        self.store.initialize()?;
        info!("Storage initialized");
        Ok(())
    }

    /// Runs one reconcile-and-dispatch cycle.
    ///
    /// # Errors
    ///
    /// Returns [`TickError`] when the lock cannot be taken in time or any
    /// step fails. The cursor is saved before dispatch, so a failed dispatch
    /// is never retried on the same message.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<TickOutcome, TickError> {
        let guard = self.lock.acquire().await?;
        let outcome = self.tick_locked(&guard).await;
        drop(guard);
        outcome
    }

    async fn tick_locked(&self, guard: &TickLockGuard) -> Result<TickOutcome, TickError> {
        let Some(mut session) = self.store.load_session()? else {
            debug!("No session to reconcile");
            return Ok(TickOutcome::NoSession);
        };
        let thread = match session.thread_handle().clone() {
            Some(thread) => thread,
            None => match self.locate_thread(guard, &mut session).await? {
                Some(thread) => thread,
                None => {
                    debug!("Session has no thread yet");
                    return Ok(TickOutcome::NoThread);
                }
            },
        };

        let events = self.transport.thread_events(&thread).await?;
        let previous = *session.cursor();
        let scanned = scan(&events, previous, &self.player_email, OUTBOUND_PREFIXES);
        if !scanned.advanced_from(previous) {
            return Ok(TickOutcome::NothingNew);
        }

        session.advance_cursor(scanned.cursor);
        self.machine.commit(guard, &session)?;
        info!(from = previous, to = scanned.cursor, "Cursor advanced");

        let Some(dispatch) = scanned.dispatch else {
            return Ok(TickOutcome::Skipped {
                cursor: scanned.cursor,
            });
        };

        let notification = self
            .machine
            .apply(guard, &mut session, dispatch.intent, Utc::now())
            .await?;
        let notified = match notification {
            Some(notification) => {
                self.notify(guard, &mut session, &notification).await?;
                true
            }
            None => false,
        };
        Ok(TickOutcome::Dispatched {
            sequence_index: dispatch.sequence_index,
            notified,
        })
    }

    /// Binds a thread that was sent but never located.
    ///
    /// The cursor starts at the top of the thread so replies the player sent
    /// meanwhile are still read; the opening message is skipped as our own.
    async fn locate_thread(
        &self,
        guard: &TickLockGuard,
        session: &mut Session,
    ) -> Result<Option<ThreadHandle>, TickError> {
        let token = session.session_token().as_str().to_string();
        let Some(thread) = self.transport.find_thread(&token).await? else {
            return Ok(None);
        };
        warn!(thread = %thread, "Recovered thread that was never bound");
        session.bind_thread(thread.clone(), 0);
        self.machine.commit(guard, session)?;
        Ok(Some(thread))
    }

    /// Renders, sends, and saves the thread binding the send may create.
    async fn notify(
        &self,
        guard: &TickLockGuard,
        session: &mut Session,
        notification: &Notification,
    ) -> Result<(), TickError> {
        let message = render(notification, session);
        self.notifier.deliver(session, &message).await?;
        self.machine.commit(guard, session)?;
        Ok(())
    }

    /// Discards any current session and starts a fresh one.
    #[instrument(skip(self))]
    pub async fn start_new_game(&self) -> Result<Session, TickError> {
        let guard = self.lock.acquire().await?;
        let (mut session, notification) = self.machine.start(&guard).await?;
        self.notify(&guard, &mut session, &notification).await?;
        info!(session_token = %session.session_token(), "New game started");
        Ok(session)
    }

    /// Finishes work an earlier failure left undone.
    ///
    /// Binds a sent but unlocated thread, resends the opening message when
    /// none went out, and retries an owed opponent move. Returns false when
    /// nothing was outstanding.
    #[instrument(skip(self))]
    pub async fn resume(&self) -> Result<bool, TickError> {
        let guard = self.lock.acquire().await?;
        let Some(mut session) = self.store.load_session()? else {
            info!("No session to resume");
            return Ok(false);
        };
        let relocated = session.thread_handle().is_none()
            && self.locate_thread(&guard, &mut session).await?.is_some();
        match self.machine.resume(&guard, &mut session).await? {
            Some(notification) => {
                self.notify(&guard, &mut session, &notification).await?;
                Ok(true)
            }
            None => Ok(relocated),
        }
    }
}
