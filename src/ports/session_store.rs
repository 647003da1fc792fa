//! Session Store port - the process-wide `session_id -> Session` mapping
//! backing the Session & Progress Plane (§4.7, §6.4).

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::SessionId;
use crate::domain::Session;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session not found: {0}")]
    NotFound(SessionId),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &Session) -> Result<(), SessionStoreError>;

    async fn load(&self, session_id: SessionId) -> Result<Session, SessionStoreError>;

    async fn exists(&self, session_id: SessionId) -> Result<bool, SessionStoreError>;

    async fn delete(&self, session_id: SessionId) -> Result<(), SessionStoreError>;
}
