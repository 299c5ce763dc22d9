//! Sender authentication.

use tracing::instrument;

/// Extracts the bare address from a sender header.
///
/// Accepts `Name <addr>` and bare `addr`; the result is lowercased.
pub fn address_of(sender: &str) -> String {
    let sender = sender.trim();
    let address = match (sender.rfind('<'), sender.rfind('>')) {
        (Some(open), Some(close)) if open < close => &sender[open + 1..close],
        _ => sender,
    };
    address.trim().to_ascii_lowercase()
}

/// True when `sender` is the configured player, ignoring display name and case.
#[instrument(level = "debug")]
pub fn is_authorized(configured: &str, sender: &str) -> bool {
    let expected = address_of(configured);
    !expected.is_empty() && expected == address_of(sender)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_and_case_are_ignored() {
        assert!(is_authorized("pat@example.com", "Pat Smith <Pat@Example.COM>"));
        assert!(is_authorized("pat@example.com", "  pat@example.com "));
    }

    #[test]
    fn other_addresses_are_rejected() {
        assert!(!is_authorized("pat@example.com", "Pat <pat@example.com.evil.org>"));
        assert!(!is_authorized("pat@example.com", "\"pat@example.com\" <mallory@example.org>"));
        assert!(!is_authorized("pat@example.com", ""));
    }

    #[test]
    fn empty_configuration_authorizes_nobody() {
        assert!(!is_authorized("", ""));
    }
}
