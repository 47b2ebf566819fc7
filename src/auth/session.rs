//! Admin session state.
//!
//! [`SessionContext`] is the only owner of the bearer token. It keeps the
//! current session in memory, mirrors it to a [`SessionStore`], and tells
//! subscribers when the server has revoked it.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, RwLock},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{AdminUser, LoginResponse};
use crate::errors::ServiceError;

/// Token plus the identity it was issued for.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub admin: AdminUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(token: impl Into<String>, admin: AdminUser) -> Self {
        Self {
            token: token.into(),
            admin,
            saved_at: Some(Utc::now()),
        }
    }
}

impl From<LoginResponse> for Session {
    fn from(response: LoginResponse) -> Self {
        Session::new(response.token, response.admin)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("admin", &self.admin)
            .field("saved_at", &self.saved_at)
            .finish()
    }
}

/// Durable backing for the session.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Session>, ServiceError>;
    fn save(&self, session: &Session) -> Result<(), ServiceError>;
    fn clear(&self) -> Result<(), ServiceError>;
}

/// Session persisted as pretty JSON on disk.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, action: &str, err: io::Error) -> ServiceError {
        ServiceError::SessionStore(format!(
            "failed {action} {}: {err}",
            self.path.display()
        ))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, ServiceError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error("reading", err)),
        };

        match serde_json::from_slice::<Session>(&bytes) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                // A corrupt file is treated as logged out rather than fatal
                warn!(path = %self.path.display(), error = %err, "ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    fn save(&self, session: &Session) -> Result<(), ServiceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error("creating directory for", e))?;
            }
        }

        let payload = serde_json::to_vec_pretty(session)?;
        fs::write(&self.path, payload).map_err(|e| self.io_error("writing", e))?;
        debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), ServiceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error("removing", err)),
        }
    }
}

/// Process-local store, used by tests and one-shot commands.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            inner: Mutex::new(Some(session)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, ServiceError> {
        Ok(self.slot().clone())
    }

    fn save(&self, session: &Session) -> Result<(), ServiceError> {
        *self.slot() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), ServiceError> {
        *self.slot() = None;
        Ok(())
    }
}

/// Emitted once when the server rejects the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutNotice {
    pub username: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Shared holder of the current admin session.
pub struct SessionContext {
    store: Arc<dyn SessionStore>,
    current: RwLock<Option<Session>>,
    logout_tx: watch::Sender<Option<LogoutNotice>>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl SessionContext {
    /// Builds a context primed from whatever the store holds.
    pub fn load(store: Arc<dyn SessionStore>) -> Result<Self, ServiceError> {
        let current = store.load()?;
        let (logout_tx, _) = watch::channel(None);
        Ok(Self {
            store,
            current: RwLock::new(current),
            logout_tx,
        })
    }

    /// Context with no persistence and no session.
    pub fn in_memory() -> Self {
        let (logout_tx, _) = watch::channel(None);
        Self {
            store: Arc::new(MemorySessionStore::new()),
            current: RwLock::new(None),
            logout_tx,
        }
    }

    pub fn get(&self) -> Option<Session> {
        self.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.token.clone())
    }

    pub fn admin(&self) -> Option<AdminUser> {
        self.read().as_ref().map(|s| s.admin.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    /// Stores a new session in memory and in the backing store.
    pub fn set(&self, session: Session) -> Result<(), ServiceError> {
        self.store.save(&session)?;
        info!(username = %session.admin.username, "admin session started");
        *self.write() = Some(session);
        Ok(())
    }

    /// Ends the session at the user's request. No logout notice is sent.
    pub fn clear(&self) -> Result<(), ServiceError> {
        self.write().take();
        self.store.clear()
    }

    /// Drops a session the server no longer accepts.
    ///
    /// Returns `true` for the call that actually removed a session. Later
    /// calls, including concurrent ones racing on the same 401, find nothing
    /// to remove and return `false`, so subscribers are notified once.
    pub fn force_logout(&self, reason: &str) -> bool {
        let Some(session) = self.write().take() else {
            return false;
        };

        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear persisted session after rejection");
        }

        warn!(username = %session.admin.username, reason, "session rejected by server; logged out");
        self.logout_tx.send_replace(Some(LogoutNotice {
            username: session.admin.username,
            reason: reason.to_string(),
            at: Utc::now(),
        }));
        true
    }

    /// Watch for forced logouts. The current value is the latest notice.
    pub fn subscribe_logout(&self) -> watch::Receiver<Option<LogoutNotice>> {
        self.logout_tx.subscribe()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Session>> {
        self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Session>> {
        self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
