//! Minimum spacing between calls to costed dependencies.

use crate::db::{DbError, SessionStore};
use crate::lock::TickLockGuard;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Result of asking to call a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call may proceed; the call time was recorded.
    Allowed,
    /// Too soon after the previous call.
    Limited {
        /// Time left until the next call is allowed.
        retry_after: Duration,
    },
}

/// Spacing limiter whose timestamps live in the session store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn SessionStore>,
    min_spacing: Duration,
}

impl RateLimiter {
    /// Creates a limiter enforcing `min_spacing` per dependency.
    pub fn new(store: Arc<dyn SessionStore>, min_spacing: Duration) -> Self {
        Self { store, min_spacing }
    }

    fn key(dependency: &str) -> String {
        format!("rate_limit:{}", dependency)
    }

    /// Admits a call to `dependency` at `now`, recording it if allowed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the timestamp cannot be read or written.
    #[instrument(skip(self, _guard), fields(min_spacing = %self.min_spacing))]
    pub fn admit(
        &self,
        _guard: &TickLockGuard,
        dependency: &str,
        now: DateTime<Utc>,
    ) -> Result<Admission, DbError> {
        let key = Self::key(dependency);
        if let Some(raw) = self.store.get(&key)? {
            match DateTime::parse_from_rfc3339(&raw) {
                Ok(last) => {
                    let next = last
                        .with_timezone(&Utc)
                        .checked_add_signed(self.min_spacing)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC);
                    if now < next {
                        let retry_after = next - now;
                        warn!(%dependency, retry_after_secs = retry_after.num_seconds(), "Call rate limited");
                        return Ok(Admission::Limited { retry_after });
                    }
                }
                Err(e) => warn!(%dependency, error = %e, "Ignoring unreadable rate-limit timestamp"),
            }
        }
        self.store.put(&key, &now.to_rfc3339())?;
        debug!(%dependency, "Call admitted");
        Ok(Admission::Allowed)
    }
}
