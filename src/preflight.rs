//! Operator preflight: configuration, secrets, reachability.

use crate::config::{ConfigError, GMAIL_TOKEN_VAR, GameConfig};
use crate::opponent::MoveSource;
use crate::transport::MailTransport;
use tracing::{info, instrument};

/// Checks configuration and that the required secrets are set.
///
/// # Errors
///
/// Returns [`ConfigError`] naming the first problem found.
#[instrument(skip(config))]
pub fn check_environment(config: &GameConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let missing: Vec<&str> = [config.llm_key_var(), GMAIL_TOKEN_VAR]
        .into_iter()
        .filter(|var| std::env::var(var).map_or(true, |v| v.trim().is_empty()))
        .collect();
    if !missing.is_empty() {
        return Err(ConfigError::new(format!(
            "Missing environment variables: {}",
            missing.join(", ")
        )));
    }
    info!("Configuration and secrets present");
    Ok(())
}

/// Probes the mail transport and the opponent's move source.
///
/// # Errors
///
/// Returns [`ConfigError`] when either is unreachable or rejects credentials.
#[instrument(skip(transport, move_source))]
pub async fn check_collaborators(
    transport: &dyn MailTransport,
    move_source: &dyn MoveSource,
) -> Result<(), ConfigError> {
    transport
        .probe()
        .await
        .map_err(|e| ConfigError::new(format!("Mail transport check failed: {}", e.message)))?;
    move_source
        .probe()
        .await
        .map_err(|e| ConfigError::new(format!("Move source check failed: {}", e.message)))?;
    info!("Collaborators reachable");
    Ok(())
}
