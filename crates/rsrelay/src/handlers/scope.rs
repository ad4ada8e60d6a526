//! Load-use-save of the caller's session around one inbound request.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use chrono::Utc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

use crate::api::SESSION_HEADER;
use crate::server::AppState;
use crate::session::{Session, SessionStore};

/// The session named by the `x-session-id` header, locked for this request.
///
/// Requests without the header, or naming an unknown id, get an empty
/// session that every relay call rejects as expired. Call [`finish`] once
/// the relay work is done to persist renewals.
///
/// [`finish`]: SessionScope::finish
pub struct SessionScope {
    store: Arc<dyn SessionStore>,
    stored: bool,
    loaded: Session,
    session: Session,
    _guard: Option<OwnedMutexGuard<()>>,
}

impl SessionScope {
    pub async fn enter(state: &AppState, session_id: Option<String>) -> Self {
        let Some(id) = session_id else {
            return Self::detached(state, Session::new(""));
        };

        let guard = state.session_locks.acquire(&id).await;
        match state.sessions.get(&id).await {
            Some(session) => Self {
                store: Arc::clone(&state.sessions),
                stored: true,
                loaded: session.clone(),
                session,
                _guard: Some(guard),
            },
            None => {
                debug!(session_id = %id, "Unknown session id");
                Self::detached(state, Session::new(id))
            }
        }
    }

    fn detached(state: &AppState, session: Session) -> Self {
        Self {
            store: Arc::clone(&state.sessions),
            stored: false,
            loaded: session.clone(),
            session,
            _guard: None,
        }
    }

    pub fn session(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Save a renewed session, or clear it from the store once it has expired.
    /// Releases the session lock.
    pub async fn finish(self) {
        if !self.stored {
            return;
        }
        if self.session.is_expired_at(Utc::now()) {
            info!(session_id = %self.session.id, "Remote session expired, clearing");
            self.store.clear(&self.session.id).await;
        } else if self.session != self.loaded {
            self.store.set(self.session).await;
        }
    }
}

impl FromRequestParts<AppState> for SessionScope {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self::enter(state, session_id_from(&parts.headers)).await)
    }
}

/// Session id named by the request, if any.
pub fn session_id_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
}
