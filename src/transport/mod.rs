//! Email transport seam: thread reads, sends, labels.

mod gmail;
mod notifier;

pub use gmail::GmailTransport;
pub use notifier::Notifier;

use async_trait::async_trait;
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_new::new;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

/// Identifier of one email conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{}", _0)]
pub struct ThreadHandle(String);

impl ThreadHandle {
    /// Wraps a transport-assigned thread id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One message in a thread, untrusted apart from `sender`.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct InboundEvent {
    /// Sender header, possibly with a display name.
    sender: String,
    /// Plain-text body, quoted history included.
    raw_body: String,
    /// Date header as sent.
    date: String,
    /// Zero-based position within the thread.
    sequence_index: usize,
}

/// Transport failure with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Transport error: {} at {}:{}", message, file, line)]
pub struct TransportError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl TransportError {
    /// Creates a new transport error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let message = message.into();
        error!(error_message = %message, "Transport error created");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Mailbox operations the game relies on.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Starts a new conversation. The transport does not return its handle.
    async fn send_new(&self, to: &str, subject: &str, body: &str) -> Result<(), TransportError>;

    /// Finds the conversation whose subject carries `token`.
    async fn find_thread(&self, token: &str) -> Result<Option<ThreadHandle>, TransportError>;

    /// Replies within an existing conversation.
    async fn reply(
        &self,
        thread: &ThreadHandle,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), TransportError>;

    /// Lists every message of the conversation in thread order.
    async fn thread_events(&self, thread: &ThreadHandle) -> Result<Vec<InboundEvent>, TransportError>;

    /// Tags the conversation for filtering.
    async fn label_thread(&self, thread: &ThreadHandle, label: &str) -> Result<(), TransportError>;

    /// Removes the conversation from the inbox.
    async fn archive_thread(&self, thread: &ThreadHandle) -> Result<(), TransportError>;

    /// Checks credentials and reachability.
    async fn probe(&self) -> Result<(), TransportError>;
}
