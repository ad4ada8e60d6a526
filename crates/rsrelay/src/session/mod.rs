//! Per-user session state for the remote API.
//!
//! A [`Session`] is an explicit value: callers load it from a
//! [`SessionStore`], hand it to the relay core by `&mut`, and save it back.
//! The core never reaches for ambient state.

mod cookie;
mod guard;
mod store;

pub use cookie::{RenewedCookie, apply_renewal, extract_renewed_cookie};
pub use guard::{ensure_valid, ensure_valid_at};
pub use store::{InMemorySessionStore, SessionStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// ID prefix for relay sessions.
pub const SESSION_ID_PREFIX: &str = "rss_";

/// Generate a fresh session id.
pub fn new_session_id() -> String {
    format!("{SESSION_ID_PREFIX}{}", Ulid::new())
}

/// The auth cookie currently held for one user, and when it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub auth_cookie: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// An empty session. It is expired until a cookie is handed over.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            auth_cookie: None,
            expires_at: None,
        }
    }

    /// A session established from a cookie issued elsewhere.
    pub fn established(
        id: impl Into<String>,
        auth_cookie: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            auth_cookie: Some(auth_cookie.into()),
            expires_at: Some(expires_at),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now > expires_at,
            None => true,
        }
    }

    /// Drop the cookie and its expiry (logout or expiry detection).
    pub fn clear(&mut self) {
        self.auth_cookie = None;
        self.expires_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_session_is_expired() {
        let session = Session::new("s1");
        assert!(session.is_expired_at(Utc::now()));
        assert!(session.auth_cookie.is_none());
    }

    #[test]
    fn established_session_expires_after_deadline() {
        let now = Utc::now();
        let session = Session::established("s1", "tok", now + Duration::minutes(5));
        assert!(!session.is_expired_at(now));
        assert!(!session.is_expired_at(now + Duration::minutes(5)));
        assert!(session.is_expired_at(now + Duration::minutes(6)));
    }

    #[test]
    fn clear_resets_cookie_and_expiry() {
        let mut session = Session::established("s1", "tok", Utc::now());
        session.clear();
        assert_eq!(session, Session::new("s1"));
    }

    #[test]
    fn session_ids_are_prefixed_and_unique() {
        let a = new_session_id();
        let b = new_session_id();
        assert!(a.starts_with(SESSION_ID_PREFIX));
        assert_ne!(a, b);
    }
}
