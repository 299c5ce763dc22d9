//! Gmail REST transport.

use super::{InboundEvent, MailTransport, ThreadHandle, TransportError};
use async_trait::async_trait;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const GMAIL_API: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Gmail emits unpadded base64url but tolerates either on input.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Deserialize)]
struct ThreadList {
    #[serde(default)]
    threads: Vec<ThreadRef>,
}

#[derive(Debug, Deserialize)]
struct ThreadRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Thread {
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    payload: MessagePart,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct PartBody {
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelList {
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Debug, Deserialize)]
struct Label {
    id: String,
    name: String,
}

impl MessagePart {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// First `text/plain` body found depth-first, decoded.
    fn plain_text(&self) -> Option<String> {
        if self.mime_type == "text/plain"
            && let Some(data) = self.body.as_ref().and_then(|b| b.data.as_ref())
        {
            return BASE64URL
                .decode(data)
                .ok()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
        }
        self.parts.iter().find_map(MessagePart::plain_text)
    }
}

/// Gmail API client authenticated with an OAuth access token.
#[derive(Debug, Clone)]
pub struct GmailTransport {
    client: reqwest::Client,
    access_token: String,
}

impl GmailTransport {
    /// Creates a transport whose every request times out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the HTTP client cannot be built.
    #[instrument(skip(access_token))]
    pub fn new(access_token: String, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::new(format!("Failed to build HTTP client: {}", e)))?;
        info!("Creating Gmail transport");
        Ok(Self {
            client,
            access_token,
        })
    }

    #[instrument(skip(self))]
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, TransportError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| TransportError::new(format!("Gmail request failed: {}", e)))?;
        Self::decode(response).await
    }

    #[instrument(skip(self, body))]
    async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::new(format!("Gmail request failed: {}", e)))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::new(format!("Failed to read Gmail response: {}", e)))?;
        if status == StatusCode::UNAUTHORIZED {
            return Err(TransportError::new(
                "Gmail rejected the access token (check GMAIL_ACCESS_TOKEN)",
            ));
        }
        if !status.is_success() {
            return Err(TransportError::new(format!("Gmail API error {}: {}", status, text)));
        }
        serde_json::from_str(&text)
            .map_err(|e| TransportError::new(format!("Unexpected Gmail response: {}", e)))
    }

    fn url(path: &str) -> Result<Url, TransportError> {
        Url::parse(&format!("{}{}", GMAIL_API, path))
            .map_err(|e| TransportError::new(format!("Invalid Gmail URL: {}", e)))
    }

    async fn fetch_thread(&self, thread: &ThreadHandle) -> Result<Thread, TransportError> {
        let url = Self::url(&format!("/threads/{}?format=full", thread.as_str()))?;
        self.get_json(url).await
    }

    async fn send_raw(
        &self,
        raw: String,
        thread: Option<&ThreadHandle>,
    ) -> Result<(), TransportError> {
        let mut body = serde_json::json!({ "raw": BASE64URL.encode(raw.as_bytes()) });
        if let Some(thread) = thread {
            body["threadId"] = serde_json::Value::String(thread.as_str().to_string());
        }
        let _: serde_json::Value = self.post_json(Self::url("/messages/send")?, &body).await?;
        Ok(())
    }

    async fn label_id(&self, label: &str) -> Result<String, TransportError> {
        let labels: LabelList = self.get_json(Self::url("/labels")?).await?;
        if let Some(existing) = labels.labels.into_iter().find(|l| l.name == label) {
            return Ok(existing.id);
        }
        debug!(label, "Creating label");
        let created: Label = self
            .post_json(Self::url("/labels")?, &serde_json::json!({ "name": label }))
            .await?;
        Ok(created.id)
    }

    async fn modify_thread(
        &self,
        thread: &ThreadHandle,
        body: serde_json::Value,
    ) -> Result<(), TransportError> {
        let url = Self::url(&format!("/threads/{}/modify", thread.as_str()))?;
        let _: serde_json::Value = self.post_json(url, &body).await?;
        Ok(())
    }
}

/// Builds a plain-text RFC 822 message.
fn compose(to: &str, subject: &str, body: &str, in_reply_to: Option<&str>) -> String {
    let mut raw = format!(
        "To: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n",
        to, subject
    );
    if let Some(message_id) = in_reply_to {
        raw.push_str(&format!(
            "In-Reply-To: {}\r\nReferences: {}\r\n",
            message_id, message_id
        ));
    }
    raw.push_str("\r\n");
    raw.push_str(&body.replace('\n', "\r\n"));
    raw
}

#[async_trait]
impl MailTransport for GmailTransport {
    #[instrument(skip(self, body))]
    async fn send_new(&self, to: &str, subject: &str, body: &str) -> Result<(), TransportError> {
        self.send_raw(compose(to, subject, body, None), None).await?;
        info!("Sent new conversation");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_thread(&self, token: &str) -> Result<Option<ThreadHandle>, TransportError> {
        let url = Url::parse_with_params(
            &format!("{}/threads", GMAIL_API),
            &[("q", format!("subject:\"{}\"", token)), ("maxResults", "1".to_string())],
        )
        .map_err(|e| TransportError::new(format!("Invalid Gmail URL: {}", e)))?;
        let list: ThreadList = self.get_json(url).await?;
        Ok(list.threads.into_iter().next().map(|t| ThreadHandle::new(t.id)))
    }

    #[instrument(skip(self, body), fields(thread = %thread))]
    async fn reply(
        &self,
        thread: &ThreadHandle,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), TransportError> {
        let existing = self.fetch_thread(thread).await?;
        let last_message_id = existing
            .messages
            .last()
            .and_then(|m| m.payload.header("Message-ID").map(str::to_string));
        if last_message_id.is_none() {
            warn!("Replying without In-Reply-To; thread has no Message-ID");
        }
        let reply_subject = if subject.starts_with("Re: ") {
            subject.to_string()
        } else {
            format!("Re: {}", subject)
        };
        let raw = compose(to, &reply_subject, body, last_message_id.as_deref());
        self.send_raw(raw, Some(thread)).await?;
        info!("Sent reply");
        Ok(())
    }

    #[instrument(skip(self), fields(thread = %thread))]
    async fn thread_events(&self, thread: &ThreadHandle) -> Result<Vec<InboundEvent>, TransportError> {
        let fetched = self.fetch_thread(thread).await?;
        let events: Vec<InboundEvent> = fetched
            .messages
            .iter()
            .enumerate()
            .map(|(index, message)| {
                InboundEvent::new(
                    message.payload.header("From").unwrap_or_default().to_string(),
                    message.payload.plain_text().unwrap_or_default(),
                    message.payload.header("Date").unwrap_or_default().to_string(),
                    index,
                )
            })
            .collect();
        debug!(count = events.len(), "Fetched thread events");
        Ok(events)
    }

    #[instrument(skip(self), fields(thread = %thread))]
    async fn label_thread(&self, thread: &ThreadHandle, label: &str) -> Result<(), TransportError> {
        let id = self.label_id(label).await?;
        self.modify_thread(thread, serde_json::json!({ "addLabelIds": [id] }))
            .await
    }

    #[instrument(skip(self), fields(thread = %thread))]
    async fn archive_thread(&self, thread: &ThreadHandle) -> Result<(), TransportError> {
        self.modify_thread(thread, serde_json::json!({ "removeLabelIds": ["INBOX"] }))
            .await
    }

    #[instrument(skip(self))]
    async fn probe(&self) -> Result<(), TransportError> {
        let profile: serde_json::Value = self.get_json(Self::url("/profile")?).await?;
        info!(account = %profile["emailAddress"], "Gmail reachable");
        Ok(())
    }
}
