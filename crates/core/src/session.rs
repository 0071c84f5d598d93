//! Authenticated session state.
//!
//! The session holds the bearer token, staff role and locality flag issued by
//! the auth endpoints. The role never changes for the lifetime of a session; a
//! new login replaces the whole [`UserAuth`] value. Persistence between
//! invocations goes through the [`SessionStorage`] trait so tests can swap the
//! file-backed adapter for an in-memory one.

use chrono::{DateTime, Duration, Utc};
use lgp_types::Role;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

/// Errors raised by session persistence.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to read session file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write session file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialise session: {0}")]
    Serialisation(serde_json::Error),
}

/// Credentials and claims issued at login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAuth {
    /// Staff role, immutable for the session's lifetime.
    pub role: Role,

    /// Bearer token sent on every authenticated request.
    pub authorisation_token: String,

    /// Token used for the one-shot refresh on a 403.
    pub refresh_token: Option<String>,

    /// Whether the user works inside the local-office (BSOL) boundary.
    pub is_bsol: bool,
}

/// The current browser-session equivalent: either logged out, or carrying a
/// [`UserAuth`] plus the time of the last recorded activity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    auth: Option<UserAuth>,
    last_activity: DateTime<Utc>,
}

impl Session {
    /// Creates a logged-out session.
    pub fn logged_out(now: DateTime<Utc>) -> Self {
        Self {
            auth: None,
            last_activity: now,
        }
    }

    /// Replaces the session contents after a successful login.
    pub fn login(&mut self, auth: UserAuth, now: DateTime<Utc>) {
        self.auth = Some(auth);
        self.last_activity = now;
    }

    /// Discards the credentials.
    pub fn logout(&mut self) {
        self.auth = None;
    }

    /// True iff credentials are held.
    pub fn is_logged_in(&self) -> bool {
        self.auth.is_some()
    }

    /// The credentials, if logged in.
    pub fn auth(&self) -> Option<&UserAuth> {
        self.auth.as_ref()
    }

    /// The bearer token, if logged in.
    pub fn bearer_token(&self) -> Option<&str> {
        self.auth.as_ref().map(|a| a.authorisation_token.as_str())
    }

    /// Replaces the tokens in place after a successful refresh. The role and
    /// locality flag are kept; the refresh endpoint re-issues tokens only.
    pub fn replace_tokens(
        &mut self,
        authorisation_token: String,
        refresh_token: Option<String>,
        now: DateTime<Utc>,
    ) {
        if let Some(auth) = self.auth.as_mut() {
            auth.authorisation_token = authorisation_token;
            if refresh_token.is_some() {
                auth.refresh_token = refresh_token;
            }
        }
        self.last_activity = now;
    }

    /// Records activity, pushing the inactivity deadline forward.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// Whether the inactivity window has elapsed since the last activity.
    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.last_activity >= window
    }
}

/// Side-effecting persistence adapter for the session.
pub trait SessionStorage {
    /// Persists the session.
    fn save(&self, session: &Session) -> Result<(), SessionError>;

    /// Loads the previously persisted session, if any.
    fn load(&self) -> Result<Option<Session>, SessionError>;

    /// Removes any persisted session.
    fn clear(&self) -> Result<(), SessionError>;
}

/// JSON-file backed session storage.
#[derive(Debug)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SessionStorage for FileSessionStorage {
    fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(SessionError::FileWrite)?;
        }
        let json =
            serde_json::to_string_pretty(session).map_err(SessionError::Serialisation)?;
        std::fs::write(&self.path, json).map_err(SessionError::FileWrite)
    }

    fn load(&self) -> Result<Option<Session>, SessionError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path).map_err(SessionError::FileRead)?;
        match serde_json::from_str::<Session>(&contents) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!("discarding unreadable session file: {}", e);
                Ok(None)
            }
        }
    }

    fn clear(&self) -> Result<(), SessionError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(SessionError::FileWrite)?;
        }
        Ok(())
    }
}

/// In-memory session storage for tests.
#[derive(Debug, Default)]
pub struct InMemorySessionStorage {
    stored: Mutex<Option<Session>>,
}

impl SessionStorage for InMemorySessionStorage {
    fn save(&self, session: &Session) -> Result<(), SessionError> {
        *self.stored.lock().expect("session store poisoned") = Some(session.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<Session>, SessionError> {
        Ok(self.stored.lock().expect("session store poisoned").clone())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.stored.lock().expect("session store poisoned") = None;
        Ok(())
    }
}

/// Restores the persisted session, applying the inactivity window.
///
/// A stored session whose last activity is older than `window` is cleared from
/// storage and replaced with a logged-out session, matching the portal's
/// inactivity logout.
pub fn restore(
    storage: &dyn SessionStorage,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<Session, SessionError> {
    match storage.load()? {
        Some(session) if session.is_logged_in() => {
            if session.is_expired(now, window) {
                tracing::info!("session expired after inactivity");
                storage.clear()?;
                Ok(Session::logged_out(now))
            } else {
                Ok(session)
            }
        }
        Some(_) | None => Ok(Session::logged_out(now)),
    }
}
