//! Session oracle.
//!
//! The sync layer only ever asks one question of the auth layer: is a user
//! signed in right now? [`SessionOracle`] is that question plus a change
//! feed, so login/logout transitions can drive refreshes.
//!
//! [`LocalSession`] is the concrete store: a bearer token and a user record,
//! held in memory, optionally persisted to a JSON file and optionally
//! announced to other tabs over a [`TabStorage`]. A file-backed session picks
//! up logins and logouts made elsewhere on [`SessionOracle::revalidate`].

mod file;

pub use file::SessionFile;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use secrecy::ExposeSecret;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use basket_sync_core::UserId;

use crate::notifier::{StorageKey, TabStorage};

/// Errors from persisting session state.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading or writing the session file failed.
    #[error("Session file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session file is not valid JSON.
    #[error("Session file JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read-only view of the authentication state.
pub trait SessionOracle: Send + Sync + 'static {
    /// Whether a user is currently signed in. Never blocks on I/O.
    fn is_authenticated(&self) -> bool;

    /// A receiver that observes every authenticated/unauthenticated change.
    fn watch(&self) -> watch::Receiver<bool>;

    /// Session generation. Advances, before the authenticated flag changes,
    /// every time a session ends or a different one begins.
    fn generation(&self) -> u64;

    /// Re-read persisted state, picking up changes made by other tabs or
    /// processes.
    fn revalidate(&self) {}
}

impl<T: SessionOracle> SessionOracle for Arc<T> {
    fn is_authenticated(&self) -> bool {
        (**self).is_authenticated()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        (**self).watch()
    }

    fn generation(&self) -> u64 {
        (**self).generation()
    }

    fn revalidate(&self) {
        (**self).revalidate();
    }
}

/// Signed-in user's profile record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Token and user record of a signed-in session.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct Credentials {
    pub token: SecretString,
    pub user: UserRecord,
}

impl Credentials {
    /// Create credentials from a raw bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>, user: UserRecord) -> Self {
        Self {
            token: SecretString::from(token.into()),
            user,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"[REDACTED]")
            .field("user", &self.user)
            .finish()
    }
}

/// Locally held session state.
///
/// Cheaply cloneable; all clones share the same state. A session is
/// authenticated only while both the token and the user record are present.
#[derive(Clone)]
pub struct LocalSession {
    inner: Arc<LocalSessionInner>,
}

struct LocalSessionInner {
    credentials: RwLock<Option<Credentials>>,
    state: watch::Sender<bool>,
    generation: AtomicU64,
    file: Option<SessionFile>,
    storage: Option<TabStorage>,
}

impl LocalSession {
    /// A signed-out, memory-only session.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_parts(None, None, None)
    }

    /// Open a session, restoring credentials from `file` when given.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the file exists but cannot be read or parsed.
    pub fn open(
        file: Option<SessionFile>,
        storage: Option<TabStorage>,
    ) -> Result<Self, SessionError> {
        let credentials = match &file {
            Some(file) => file.load()?,
            None => None,
        };
        if credentials.is_some() {
            tracing::debug!("restored persisted session");
        }
        Ok(Self::from_parts(credentials, file, storage))
    }

    fn from_parts(
        credentials: Option<Credentials>,
        file: Option<SessionFile>,
        storage: Option<TabStorage>,
    ) -> Self {
        let (state, _) = watch::channel(credentials.is_some());
        Self {
            inner: Arc::new(LocalSessionInner {
                credentials: RwLock::new(credentials),
                state,
                generation: AtomicU64::new(0),
                file,
                storage,
            }),
        }
    }

    /// Sign in, persisting and announcing the new credentials.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if persisting fails. The in-memory session is
    /// signed in regardless.
    pub fn login(&self, credentials: Credentials) -> Result<(), SessionError> {
        let user_id = credentials.user.id.clone();
        let persisted = self
            .inner
            .file
            .as_ref()
            .map_or(Ok(()), |file| file.store(&credentials));

        *self
            .inner
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credentials);
        self.advance_generation();
        self.inner.state.send_replace(true);
        self.announce();
        tracing::info!(user_id = %user_id, "session started");

        persisted
    }

    /// Sign out, clearing persisted and in-memory credentials.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session file cannot be removed. The
    /// in-memory session is signed out regardless.
    pub fn logout(&self) -> Result<(), SessionError> {
        let previous = self
            .inner
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let cleared = self.inner.file.as_ref().map_or(Ok(()), SessionFile::clear);

        if previous.is_some() || self.is_authenticated() {
            self.advance_generation();
            self.inner.state.send_replace(false);
            self.announce();
            tracing::info!("session ended");
        }

        cleared
    }

    /// Re-read the session file and adopt whatever it holds.
    ///
    /// Returns whether the session changed. Nothing is written back or
    /// announced. A memory-only session never changes here.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the file exists but cannot be read or parsed.
    /// The in-memory session is left as it was.
    pub fn reload(&self) -> Result<bool, SessionError> {
        let Some(file) = &self.inner.file else {
            return Ok(false);
        };
        let loaded = file.load()?;

        let mut credentials = self
            .inner
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let unchanged = match (credentials.as_ref(), loaded.as_ref()) {
            (None, None) => true,
            (Some(current), Some(stored)) => {
                current.user == stored.user
                    && current.token.expose_secret() == stored.token.expose_secret()
            }
            _ => false,
        };
        if unchanged {
            return Ok(false);
        }

        let authenticated = loaded.is_some();
        *credentials = loaded;
        drop(credentials);

        self.advance_generation();
        self.inner.state.send_replace(authenticated);
        tracing::info!(authenticated, "session changed elsewhere");
        Ok(true)
    }

    /// The bearer token, if signed in.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.inner
            .credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|credentials| credentials.token.clone())
    }

    /// The signed-in user's record, if signed in.
    #[must_use]
    pub fn user(&self) -> Option<UserRecord> {
        self.inner
            .credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|credentials| credentials.user.clone())
    }

    fn advance_generation(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn announce(&self) {
        if let Some(storage) = &self.inner.storage {
            storage.publish(StorageKey::AuthToken);
            storage.publish(StorageKey::UserData);
        }
    }
}

impl SessionOracle for LocalSession {
    fn is_authenticated(&self) -> bool {
        *self.inner.state.borrow()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.inner.state.subscribe()
    }

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    fn revalidate(&self) {
        if let Err(e) = self.reload() {
            tracing::warn!(error = %e, "failed to re-read session file");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notifier::StorageBus;

    fn credentials() -> Credentials {
        Credentials::new(
            "tok-abc123",
            UserRecord {
                id: UserId::new("u-1"),
                name: Some("Asha".to_string()),
                phone: None,
            },
        )
    }

    #[test]
    fn test_in_memory_starts_signed_out() {
        let session = LocalSession::in_memory();
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
    }

    #[test]
    fn test_login_logout_transitions() {
        let session = LocalSession::in_memory();
        let mut changes = session.watch();

        session.login(credentials()).unwrap();
        assert!(session.is_authenticated());
        assert!(changes.has_changed().unwrap());
        assert!(*changes.borrow_and_update());
        assert_eq!(session.token().unwrap().expose_secret(), "tok-abc123");
        assert_eq!(session.user().unwrap().id, UserId::new("u-1"));

        session.logout().unwrap();
        assert!(!session.is_authenticated());
        assert!(!*changes.borrow_and_update());
        assert!(session.user().is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let session = LocalSession::in_memory();
        let other = session.clone();
        session.login(credentials()).unwrap();
        assert!(other.is_authenticated());
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", credentials());
        assert!(!debug.contains("tok-abc123"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_login_is_announced_to_other_tabs() {
        let bus = StorageBus::default();
        let tab = bus.open_tab();
        let mut other_tab = bus.receiver();
        let session = LocalSession::open(None, Some(tab.clone())).unwrap();

        session.login(credentials()).unwrap();
        let event = other_tab.recv().await.unwrap();
        assert_eq!(event.origin, tab.tab());
        assert_eq!(event.key, StorageKey::AuthToken);
    }

    #[test]
    fn test_logout_when_signed_out_is_quiet() {
        let bus = StorageBus::default();
        let mut other_tab = bus.receiver();
        let session = LocalSession::open(None, Some(bus.open_tab())).unwrap();

        session.logout().unwrap();
        assert!(other_tab.try_recv().is_err());
    }

    #[test]
    fn test_generation_advances_on_every_transition() {
        let session = LocalSession::in_memory();
        let start = session.generation();

        session.logout().unwrap();
        assert_eq!(session.generation(), start);

        session.login(credentials()).unwrap();
        let signed_in = session.generation();
        assert!(signed_in > start);

        session.logout().unwrap();
        assert!(session.generation() > signed_in);
    }

    #[test]
    fn test_reload_adopts_logout_from_another_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let first = LocalSession::open(Some(SessionFile::new(&path)), None).unwrap();
        first.login(credentials()).unwrap();
        let second = LocalSession::open(Some(SessionFile::new(&path)), None).unwrap();
        assert!(second.is_authenticated());
        let generation = second.generation();

        first.logout().unwrap();
        assert!(second.is_authenticated());
        assert!(second.reload().unwrap());
        assert!(!second.is_authenticated());
        assert!(second.token().is_none());
        assert!(second.generation() > generation);
        assert!(!second.reload().unwrap());
    }

    #[test]
    fn test_reload_adopts_login_from_another_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let first = LocalSession::open(Some(SessionFile::new(&path)), None).unwrap();
        let second = LocalSession::open(Some(SessionFile::new(&path)), None).unwrap();
        let mut changes = second.watch();

        first.login(credentials()).unwrap();
        second.revalidate();

        assert!(second.is_authenticated());
        assert!(*changes.borrow_and_update());
        assert_eq!(second.user().unwrap().id, UserId::new("u-1"));
    }

    #[test]
    fn test_reload_without_file_keeps_memory_state() {
        let session = LocalSession::in_memory();
        session.login(credentials()).unwrap();
        assert!(!session.reload().unwrap());
        assert!(session.is_authenticated());
    }
}
