use chrono::{DateTime, Utc};

use super::Session;
use crate::gateway::RelayError;

/// Fail fast with [`RelayError::SessionExpired`] unless the session is live.
///
/// Must run before every outbound call. It has no side effects.
pub fn ensure_valid(session: &Session) -> Result<(), RelayError> {
    ensure_valid_at(session, Utc::now())
}

/// [`ensure_valid`] against an explicit clock.
pub fn ensure_valid_at(session: &Session, now: DateTime<Utc>) -> Result<(), RelayError> {
    if session.is_expired_at(now) {
        return Err(RelayError::SessionExpired);
    }
    Ok(())
}
