//! Session file remembering which user is logged in.
//!
//! The file lives in the data directory and holds only the user id; it is
//! local state for the command-line front end.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fs_util::{read_json, write_json_atomic};
use crate::models::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: UserId,
    pub username: String,
    /// When the login happened.
    #[serde(default)]
    pub logged_in_at: Option<DateTime<Utc>>,
}

pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current session, or `None` when nobody is logged in.
    pub async fn get(&self) -> Result<Option<SessionData>> {
        read_json(&self.path)
            .await
            .with_context(|| format!("Failed to load session file: {:?}", self.path))
    }

    pub async fn set(&self, session: &SessionData) -> Result<()> {
        write_json_atomic(&self.path, session)
            .await
            .with_context(|| format!("Failed to write session file: {:?}", self.path))
    }

    /// Removes the session file. Returns whether one existed.
    pub async fn clear(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to delete session file: {:?}", self.path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_util::temp_path;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_set_get_clear() -> Result<()> {
        let dir = TempDir::new()?;
        let file = SessionFile::new(dir.path().join("session.json"));
        assert_eq!(file.get().await?, None);

        let session = SessionData {
            user_id: UserId::new(4),
            username: "dana".to_string(),
            logged_in_at: None,
        };
        file.set(&session).await?;
        assert_eq!(file.get().await?, Some(session));
        assert!(!temp_path(file.path()).exists());

        assert!(file.clear().await?);
        assert!(!file.clear().await?);
        assert_eq!(file.get().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_creates_data_dir() -> Result<()> {
        let dir = TempDir::new()?;
        let file = SessionFile::new(dir.path().join("nested").join("session.json"));

        let session = SessionData {
            user_id: UserId::new(1),
            username: "ann".to_string(),
            logged_in_at: None,
        };
        file.set(&session).await?;
        assert_eq!(file.get().await?, Some(session));
        Ok(())
    }

    #[tokio::test]
    async fn test_minimal_session_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"user_id": 2, "username": "eve"}"#)?;

        let session = SessionFile::new(&path).get().await?.unwrap();
        assert_eq!(session.user_id, UserId::new(2));
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_session_is_error() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{\"user_id\":")?;

        let err = SessionFile::new(&path).get().await.unwrap_err();
        assert!(format!("{err:#}").contains("session.json"));
        Ok(())
    }
}
