//! Per-visitor session store.
//!
//! This module provides an in-memory session store with sliding TTL
//! management. A visitor's opaque cookie token maps to a [`SessionData`]
//! holding that visitor's lists and the one-shot flash messages.
//!
//! A visitor without a live session works on a fresh, unstored
//! [`SessionData`]. It only enters the store, and the cookie is only issued,
//! once a request leaves lists or a pending flash behind. Visitors that just
//! read pages never take up a slot.
//!
//! # Token Format
//!
//! Session tokens are 32 bytes of cryptographically secure random data,
//! base64-url encoded without padding, resulting in 43 character tokens.
//!
//! # Thread Safety
//!
//! The map of sessions sits behind a [`RwLock`]. Each session's data has
//! its own async [`Mutex`], so requests of one visitor are serialized while
//! different visitors never contend with each other.
//!
//! # Example
//!
//! ```rust
//! use todolists_server::session::{SessionData, SessionStore, SessionStoreConfig};
//!
//! let store = SessionStore::new(SessionStoreConfig::default());
//!
//! let token = store.insert(SessionData::default()).expect("store has capacity");
//! assert!(store.resume(&token).is_some());
//! assert!(store.resume("unknown").is_none());
//! ```

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use axum::extract::{FromRef, FromRequestParts};
use std::convert::Infallible;

use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, trace, warn};

use crate::error::ServerError;
use crate::types::TodoLists;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "todolists_session";

/// Default idle lifetime of a session (24 hours).
pub const DEFAULT_TTL_SECS: u64 = 86_400;

/// Default maximum number of sessions.
pub const DEFAULT_MAX_CAPACITY: usize = 10_000;

/// Size of the random token in bytes.
const TOKEN_BYTES: usize = 32;

/// Expected length of base64-url encoded token (43 characters).
const TOKEN_LENGTH: usize = 43;

/// Errors that can occur during session operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session store has reached maximum capacity.
    #[error("session store at maximum capacity ({max_capacity} sessions)")]
    AtCapacity {
        /// The maximum number of sessions allowed.
        max_capacity: usize,
    },
}

/// Configuration for the session store.
#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Maximum number of concurrent sessions.
    pub max_capacity: usize,

    /// Idle time after which a session is dropped.
    pub ttl: Duration,

    /// Whether the session cookie is marked `Secure`.
    pub secure_cookie: bool,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            max_capacity: DEFAULT_MAX_CAPACITY,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            secure_cookie: false,
        }
    }
}

impl SessionStoreConfig {
    /// Creates a new configuration with custom values.
    pub fn new(max_capacity: usize, ttl: Duration, secure_cookie: bool) -> Self {
        Self {
            max_capacity,
            ttl,
            secure_cookie,
        }
    }
}

/// One-shot status messages shown on the next rendered page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub error: Option<String>,
    pub success: Option<String>,
}

impl Flash {
    pub fn is_empty(&self) -> bool {
        self.error.is_none() && self.success.is_none()
    }

    /// Moves the messages out, leaving both slots empty.
    pub fn take(&mut self) -> Flash {
        std::mem::take(self)
    }
}

/// Everything a visitor's session holds.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    /// The visitor's lists, created empty with the session.
    pub lists: TodoLists,
    flash: Flash,
}

impl SessionData {
    /// Sets the error flash for the next rendered page.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.flash.error = Some(message.into());
    }

    /// Sets the success flash for the next rendered page.
    pub fn set_success(&mut self, message: impl Into<String>) {
        self.flash.success = Some(message.into());
    }

    /// Reads and clears the flash. Only the rendering path calls this.
    pub fn take_flash(&mut self) -> Flash {
        self.flash.take()
    }

    /// Splits the session into its lists and pending flash, so a page can
    /// be rendered from both. The flash stays put unless the caller takes it.
    pub fn render_parts(&mut self) -> (&TodoLists, &mut Flash) {
        (&self.lists, &mut self.flash)
    }

    /// `true` while there is nothing worth storing.
    fn is_blank(&self) -> bool {
        self.lists.is_empty() && self.flash.is_empty()
    }
}

struct StoredSession {
    data: Arc<Mutex<SessionData>>,
    expires_at: Instant,
}

impl StoredSession {
    fn new(data: SessionData, ttl: Duration) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Thread-safe in-memory session store.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
    config: SessionStoreConfig,
}

impl SessionStore {
    /// Creates a new session store with the given configuration.
    pub fn new(config: SessionStoreConfig) -> Self {
        debug!(
            max_capacity = config.max_capacity,
            ttl_secs = config.ttl.as_secs(),
            secure_cookie = config.secure_cookie,
            "Creating new session store"
        );
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Looks up the live session for `token` and pushes its expiry out by
    /// the TTL.
    ///
    /// Malformed, unknown and expired tokens yield `None`; an expired
    /// session is dropped on the spot.
    pub fn resume(&self, token: &str) -> Option<Arc<Mutex<SessionData>>> {
        if token.len() != TOKEN_LENGTH {
            trace!("Malformed session token");
            return None;
        }

        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match sessions.get_mut(token) {
            Some(stored) if !stored.is_expired() => {
                stored.expires_at = Instant::now() + self.config.ttl;
                trace!("Session resumed");
                Some(Arc::clone(&stored.data))
            }
            Some(_) => {
                sessions.remove(token);
                trace!("Removed expired session on access");
                None
            }
            None => {
                trace!("Session token not found");
                None
            }
        }
    }

    /// Stores `data` under a newly generated token and returns the token.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AtCapacity`] if the store is full even after
    /// dropping expired sessions.
    pub fn insert(&self, data: SessionData) -> Result<String, SessionError> {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if sessions.len() >= self.config.max_capacity {
            sessions.retain(|_, stored| !stored.is_expired());
        }
        if sessions.len() >= self.config.max_capacity {
            warn!(
                capacity = sessions.len(),
                max_capacity = self.config.max_capacity,
                "Session store at capacity, rejecting new session"
            );
            return Err(SessionError::AtCapacity {
                max_capacity: self.config.max_capacity,
            });
        }

        let token = generate_session_token();
        sessions.insert(token.clone(), StoredSession::new(data, self.config.ttl));
        trace!(ttl_secs = self.config.ttl.as_secs(), "Stored new session");

        Ok(token)
    }

    /// Builds the cookie that carries `token`.
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.config.secure_cookie)
            .build()
    }

    /// Returns the current number of sessions, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all expired sessions from the store.
    ///
    /// Returns the number of sessions that were removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let initial_len = sessions.len();

        sessions.retain(|_, stored| !stored.is_expired());

        let removed = initial_len - sessions.len();
        if removed > 0 {
            debug!(
                removed_count = removed,
                remaining_count = sessions.len(),
                "Cleaned up expired sessions"
            );
        }
        removed
    }

    /// Spawns a background task that drops expired sessions every
    /// `cleanup_interval`.
    pub fn spawn_cleanup_task(
        self: &Arc<Self>,
        cleanup_interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_interval);
            loop {
                interval.tick().await;
                store.cleanup_expired();
            }
        })
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionStoreConfig::default())
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session_count", &self.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Where the data of the current request's session lives.
enum SessionSlot {
    /// A live stored session, locked until the response is built.
    Stored(OwnedMutexGuard<SessionData>),
    /// No live session yet; stored on response if anything was kept.
    Fresh(SessionData),
}

/// The visitor's session for the duration of one request.
///
/// Handlers receive this as an extractor, mutate it through `Deref`, and
/// hand their response to [`CurrentSession::respond`], which stores a fresh
/// session and issues its cookie when needed.
pub struct CurrentSession {
    slot: SessionSlot,
    store: Arc<SessionStore>,
}

impl CurrentSession {
    /// Finishes the request with `response`.
    ///
    /// A fresh session that now holds lists or a pending flash is stored and
    /// its cookie attached. If the store is full the visitor gets
    /// `503 Service Unavailable` instead.
    pub fn respond(self, response: impl IntoResponse) -> Response {
        let data = match self.slot {
            SessionSlot::Stored(_) => return response.into_response(),
            SessionSlot::Fresh(data) => data,
        };
        if data.is_blank() {
            return response.into_response();
        }

        match self.store.insert(data) {
            Ok(token) => {
                let jar = CookieJar::new().add(self.store.session_cookie(token));
                (jar, response).into_response()
            }
            Err(err) => ServerError::from(err).into_response(),
        }
    }
}

impl Deref for CurrentSession {
    type Target = SessionData;

    fn deref(&self) -> &Self::Target {
        match &self.slot {
            SessionSlot::Stored(guard) => &**guard,
            SessionSlot::Fresh(data) => data,
        }
    }
}

impl DerefMut for CurrentSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.slot {
            SessionSlot::Stored(guard) => &mut **guard,
            SessionSlot::Fresh(data) => data,
        }
    }
}

impl<S> FromRequestParts<S> for CurrentSession
where
    Arc<SessionStore>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = Arc::<SessionStore>::from_ref(state);
        let resumed = CookieJar::from_headers(&parts.headers)
            .get(SESSION_COOKIE)
            .and_then(|cookie| store.resume(cookie.value()));

        let slot = match resumed {
            Some(data) => SessionSlot::Stored(data.lock_owned().await),
            None => SessionSlot::Fresh(SessionData::default()),
        };

        Ok(Self { slot, store })
    }
}

/// Generates a cryptographically secure session token.
fn generate_session_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
