//! Delivers rendered messages and anchors the session to its thread.

use super::{MailTransport, TransportError};
use crate::render::RenderedMessage;
use crate::session::Session;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Sends notifications to the player.
///
/// The first message of a session opens a new thread, which is then found
/// again by searching for the session token in its subject.
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn MailTransport>,
    player_email: String,
    label: Option<String>,
    archive_after_send: bool,
    locate_retry_delay: Duration,
}

impl Notifier {
    /// Creates a notifier addressing `player_email`.
    #[instrument(skip(transport))]
    pub fn new(
        transport: Arc<dyn MailTransport>,
        player_email: String,
        label: Option<String>,
        archive_after_send: bool,
        locate_retry_delay: Duration,
    ) -> Self {
        Self {
            transport,
            player_email,
            label,
            archive_after_send,
            locate_retry_delay,
        }
    }

    /// Sends `message`, binding the session to a new thread if it has none.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if sending fails or a new thread cannot be
    /// located after one retry. Labeling and archiving never fail delivery.
    #[instrument(skip(self, session, message), fields(session_token = %session.session_token()))]
    pub async fn deliver(
        &self,
        session: &mut Session,
        message: &RenderedMessage,
    ) -> Result<(), TransportError> {
        let thread = match session.thread_handle().clone() {
            Some(thread) => {
                self.transport
                    .reply(&thread, &self.player_email, message.subject(), message.body())
                    .await?;
                thread
            }
            None => {
                self.transport
                    .send_new(&self.player_email, message.subject(), message.body())
                    .await?;
                let token = session.session_token().as_str().to_string();
                let thread = match self.transport.find_thread(&token).await? {
                    Some(thread) => thread,
                    None => {
                        info!(delay = ?self.locate_retry_delay, "New thread not visible yet, retrying once");
                        tokio::time::sleep(self.locate_retry_delay).await;
                        self.transport.find_thread(&token).await?.ok_or_else(|| {
                            TransportError::new(format!("Could not locate thread for {}", token))
                        })?
                    }
                };
                let existing = self.transport.thread_events(&thread).await?.len();
                session.bind_thread(thread.clone(), existing);
                thread
            }
        };

        if let Some(label) = &self.label
            && let Err(e) = self.transport.label_thread(&thread, label).await
        {
            warn!(error = %e, label = %label, "Failed to label thread");
        }
        if self.archive_after_send
            && let Err(e) = self.transport.archive_thread(&thread).await
        {
            warn!(error = %e, "Failed to archive thread");
        }

        info!(thread = %thread, "Notification delivered");
        Ok(())
    }
}
