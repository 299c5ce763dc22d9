//! Strict decoding of generative collaborator replies.
//!
//! A reply is accepted only if it reduces to exactly one JSON object that
//! decodes into the expected schema. Nothing is merged from a partial match.

use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

/// Outcome of decoding a generative reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<T> {
    /// The reply matched the schema.
    Ok(T),
    /// The reply did not match; the reason is for logs and errors.
    Malformed(String),
}

impl<T> Parsed<T> {
    /// Converts into a `Result`, keeping the malformation reason.
    pub fn into_result(self) -> Result<T, String> {
        match self {
            Parsed::Ok(value) => Ok(value),
            Parsed::Malformed(reason) => Err(reason),
        }
    }
}

/// Strips a surrounding markdown code fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the fence line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Decodes a reply that must be a single JSON object of type `T`.
#[instrument(level = "debug", skip(reply), fields(reply_len = reply.len()))]
pub fn parse_reply<T: DeserializeOwned>(reply: &str) -> Parsed<T> {
    let body = strip_code_fence(reply);
    if !(body.starts_with('{') && body.ends_with('}')) {
        warn!("Reply is not a bare JSON object");
        return Parsed::Malformed(format!(
            "expected a JSON object, got: {}",
            body.chars().take(80).collect::<String>()
        ));
    }
    match serde_json::from_str::<T>(body) {
        Ok(value) => {
            debug!("Reply matched schema");
            Parsed::Ok(value)
        }
        Err(e) => {
            warn!(error = %e, "Reply did not match schema");
            Parsed::Malformed(format!("schema mismatch: {}", e))
        }
    }
}
