//! In-Memory Session Store Adapter
//!
//! Stores sessions in memory. Useful for testing and development, or as
//! the process cache in front of `FileSessionStore`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{SessionId, Timestamp};
use crate::domain::Session;
use crate::ports::{SessionStore, SessionStoreError};

/// Default session TTL (§4.7): sessions older than this are evicted from
/// memory the next time they're accessed.
pub const SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct InMemoryStateStorage {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
    ttl_seconds: i64,
}

impl InMemoryStateStorage {
    pub fn new() -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())), ttl_seconds: SESSION_TTL_SECONDS }
    }

    pub fn with_ttl_seconds(ttl_seconds: i64) -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())), ttl_seconds }
    }

    pub async fn clear(&self) {
        self.sessions.write().await.clear();
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn is_expired(&self, session: &Session) -> bool {
        Timestamp::now().duration_since(&session.created_at).num_seconds() > self.ttl_seconds
    }
}

impl Default for InMemoryStateStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemoryStateStorage {
    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        self.sessions.write().await.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn load(&self, session_id: SessionId) -> Result<Session, SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&session_id) {
            Some(session) if self.is_expired(session) => {
                sessions.remove(&session_id);
                Err(SessionStoreError::NotFound(session_id))
            }
            Some(session) => Ok(session.clone()),
            None => Err(SessionStoreError::NotFound(session_id)),
        }
    }

    async fn exists(&self, session_id: SessionId) -> Result<bool, SessionStoreError> {
        Ok(self.load(session_id).await.is_ok())
    }

    async fn delete(&self, session_id: SessionId) -> Result<(), SessionStoreError> {
        self.sessions.write().await.remove(&session_id);
        Ok(())
    }
}
