//! JSON file persistence for the session.
//!
//! The file mirrors the two persisted keys the storefront keeps in local
//! storage: `authToken` and `userData`. A file holding only one of them is
//! treated as signed out.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::{Credentials, SessionError, UserRecord};

/// On-disk session shape.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_data: Option<UserRecord>,
}

/// Location of a persisted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    /// Persist the session at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read persisted credentials. A missing file means signed out.
    pub(crate) fn load(&self) -> Result<Option<Credentials>, SessionError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(None);
        }

        let stored: StoredSession = serde_json::from_str(&contents)?;
        Ok(match (stored.auth_token, stored.user_data) {
            (Some(token), Some(user)) if !token.is_empty() => Some(Credentials::new(token, user)),
            _ => None,
        })
    }

    /// Write credentials, replacing any previous session.
    pub(crate) fn store(&self, credentials: &Credentials) -> Result<(), SessionError> {
        let stored = StoredSession {
            auth_token: Some(credentials.token.expose_secret().to_owned()),
            user_data: Some(credentials.user.clone()),
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&stored)?)?;
        Ok(())
    }

    /// Remove the persisted session. Removing a missing file succeeds.
    pub(crate) fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use basket_sync_core::UserId;

    use super::*;
    use crate::session::{LocalSession, SessionOracle};

    fn user() -> UserRecord {
        UserRecord {
            id: UserId::new("u-7"),
            name: None,
            phone: Some("+91 98000 00000".to_string()),
        }
    }

    #[test]
    fn test_missing_file_is_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        assert!(file.load().unwrap().is_none());
        file.clear().unwrap();
    }

    #[test]
    fn test_store_then_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let session = LocalSession::open(Some(SessionFile::new(&path)), None).unwrap();
        session.login(Credentials::new("tok-xyz", user())).unwrap();

        let restored = LocalSession::open(Some(SessionFile::new(&path)), None).unwrap();
        assert!(restored.is_authenticated());
        assert_eq!(restored.user().unwrap(), user());

        restored.logout().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_token_without_user_is_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"authToken": "tok-only"}"#).unwrap();

        assert!(SessionFile::new(&path).load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = LocalSession::open(Some(SessionFile::new(&path)), None)
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::Json(_)));
    }

    #[test]
    fn test_persisted_shape() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        file.store(&Credentials::new("tok-1", user())).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(json["authToken"], "tok-1");
        assert_eq!(json["userData"]["id"], "u-7");
    }
}
