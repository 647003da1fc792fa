//! File-based Session Store Adapter
//!
//! Stores one JSON document per session, at
//! `<base_path>/sessions/<session_id>.json` (§6.4).

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::foundation::SessionId;
use crate::domain::Session;
use crate::ports::{SessionStore, SessionStoreError};

#[derive(Debug, Clone)]
pub struct FileStateStorage {
    base_path: PathBuf,
}

impl FileStateStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self { base_path: base_path.as_ref().join("sessions") }
    }

    fn session_file_path(&self, session_id: SessionId) -> PathBuf {
        self.base_path.join(format!("{session_id}.json"))
    }

    async fn ensure_dir(&self) -> Result<(), SessionStoreError> {
        fs::create_dir_all(&self.base_path).await.map_err(|e| SessionStoreError::Io(e.to_string()))
    }
}

#[async_trait]
impl SessionStore for FileStateStorage {
    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        self.ensure_dir().await?;

        let json = serde_json::to_string_pretty(session).map_err(|e| SessionStoreError::Serialization(e.to_string()))?;

        fs::write(self.session_file_path(session.session_id), json).await.map_err(|e| SessionStoreError::Io(e.to_string()))?;

        Ok(())
    }

    async fn load(&self, session_id: SessionId) -> Result<Session, SessionStoreError> {
        let file_path = self.session_file_path(session_id);

        if !file_path.exists() {
            return Err(SessionStoreError::NotFound(session_id));
        }

        let json = fs::read_to_string(&file_path).await.map_err(|e| SessionStoreError::Io(e.to_string()))?;

        serde_json::from_str(&json).map_err(|e| SessionStoreError::Serialization(e.to_string()))
    }

    async fn exists(&self, session_id: SessionId) -> Result<bool, SessionStoreError> {
        Ok(self.session_file_path(session_id).exists())
    }

    async fn delete(&self, session_id: SessionId) -> Result<(), SessionStoreError> {
        let file_path = self.session_file_path(session_id);

        if file_path.exists() {
            fs::remove_file(&file_path).await.map_err(|e| SessionStoreError::Io(e.to_string()))?;
        }

        Ok(())
    }
}
