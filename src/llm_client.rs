//! LLM API client for the generative collaborators (oracle, opponent, commentary).

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client as OpenAIClient,
};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// LLM provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI (GPT models).
    OpenAI,
    /// Anthropic (Claude models).
    Anthropic,
}

/// Provider, credentials and limits for one [`LlmClient`].
#[derive(Debug, Clone)]
pub struct LlmConfig {
    provider: LlmProvider,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl LlmConfig {
    /// Creates a new LLM configuration.
    #[instrument(skip(api_key), fields(provider = ?provider, model = %model))]
    pub fn new(
        provider: LlmProvider,
        api_key: String,
        model: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        debug!("Creating LLM config");
        Self {
            provider,
            api_key,
            model,
            max_tokens,
            timeout,
        }
    }
}

/// Anything that turns a system prompt and a user message into text.
///
/// The generative collaborators depend on this rather than on [`LlmClient`]
/// so they can be driven by scripted replies in tests.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates a completion.
    async fn generate(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError>;
}

/// Transport for the configured provider, built once per client.
#[derive(Debug, Clone)]
enum Backend {
    Anthropic(reqwest::Client),
    OpenAI(OpenAIClient<OpenAIConfig>),
}

/// Text generator backed by a hosted model.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: LlmConfig,
    backend: Backend,
}

impl LlmClient {
    /// Creates a client and its provider transport.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] when the HTTP client cannot be built.
    #[instrument(skip(config), fields(provider = ?config.provider, model = %config.model))]
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let backend = match config.provider {
            LlmProvider::Anthropic => Backend::Anthropic(
                reqwest::Client::builder()
                    .timeout(config.timeout)
                    .build()
                    .map_err(|e| LlmError::new(format!("Failed to build HTTP client: {}", e)))?,
            ),
            LlmProvider::OpenAI => Backend::OpenAI(OpenAIClient::with_config(
                OpenAIConfig::new().with_api_key(config.api_key.clone()),
            )),
        };
        info!("Created LLM client");
        Ok(Self { config, backend })
    }

    /// Generates a completion, bounded by the configured timeout.
    #[instrument(skip(self, system_prompt, user_message), fields(provider = ?self.config.provider, model = %self.config.model))]
    pub async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, LlmError> {
        let request = async {
            match &self.backend {
                Backend::Anthropic(http) => {
                    self.anthropic(http, system_prompt, user_message).await
                }
                Backend::OpenAI(client) => self.openai(client, system_prompt, user_message).await,
            }
        };
        let content = tokio::time::timeout(self.config.timeout, request)
            .await
            .map_err(|_| {
                LlmError::new(format!(
                    "LLM request timed out after {:?}",
                    self.config.timeout
                ))
            })??;
        info!(content_length = content.len(), "Generated completion");
        Ok(content)
    }

    async fn anthropic(
        &self,
        http: &reqwest::Client,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, LlmError> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: system_prompt,
            messages: [UserTurn {
                role: "user",
                content: user_message,
            }],
        };

        let response = http
            .post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Anthropic API request failed");
                LlmError::new(format!("Anthropic API request failed: {}", e))
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::new(format!("Failed to read response: {}", e)))?;
        if !status.is_success() {
            error!(status = %status, response = %text, "Anthropic API error");
            return Err(LlmError::new(format!("Anthropic API error {}: {}", status, text)));
        }
        anthropic_text(&text)
    }

    async fn openai(
        &self,
        client: &OpenAIClient<OpenAIConfig>,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, LlmError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(|e| LlmError::new(format!("Failed to build system message: {}", e)))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| LlmError::new(format!("Failed to build user message: {}", e)))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .messages(vec![
                ChatCompletionRequestMessage::System(system),
                ChatCompletionRequestMessage::User(user),
            ])
            .max_tokens(self.config.max_tokens)
            .build()
            .map_err(|e| LlmError::new(format!("Failed to build request: {}", e)))?;

        let response = client.chat().create(request).await.map_err(|e| {
            error!(error = ?e, "OpenAI API error");
            LlmError::new(format!("OpenAI API error: {}", e))
        })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::new("No content in OpenAI response"))
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserTurn<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Joins the text blocks of an Anthropic messages response.
fn anthropic_text(body: &str) -> Result<String, LlmError> {
    let parsed: MessagesResponse = serde_json::from_str(body).map_err(|e| {
        error!(error = ?e, response = %body, "Failed to parse Anthropic response");
        LlmError::new(format!("Failed to parse response: {}", e))
    })?;
    let text: String = parsed
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if text.is_empty() {
        return Err(LlmError::new("No text content in Anthropic response"));
    }
    Ok(text)
}

/// LLM client error.
#[derive(Debug, Clone, Display, Error)]
#[display("LLM error: {} at {}:{}", message, file, line)]
pub struct LlmError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl LlmError {
    /// Creates a new LLM error.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let loc = std::panic::Location::caller();
        error!(error_message = %message, "LLM error created");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[async_trait::async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError> {
        LlmClient::generate(self, system_prompt, user_message).await
    }
}
