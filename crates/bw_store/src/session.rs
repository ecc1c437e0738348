//! Session persistence seam.
//!
//! A session row carries the access token, its refresh token, the IKM and the
//! derived key material.  Lookups never filter on expiry; `TokenStore` decides
//! what an expired row means.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{error::StoreError, models::Session};

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: Session) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Session>, StoreError>;

    async fn find_by_access_token(&self, access_token: &str) -> Result<Option<Session>, StoreError>;

    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Session>, StoreError>;

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError>;

    /// Returns the number of sessions removed.
    async fn delete_by_user_id(&self, user_id: &str) -> Result<u64, StoreError>;

    /// Replace the client box key bound to a session.  `false` if the session is gone.
    async fn set_client_public_key(
        &self,
        id: &str,
        client_public_key: Option<String>,
    ) -> Result<bool, StoreError>;
}

/// In-process session table keyed by session id.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: Session) -> Result<(), StoreError> {
        let mut map = self.sessions.write();
        if map
            .values()
            .any(|s| s.token.access_token == session.token.access_token)
        {
            return Err(StoreError::Backend("access token already issued".into()));
        }
        map.insert(session.token.id.clone(), session);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().get(id).cloned())
    }

    async fn find_by_access_token(&self, access_token: &str) -> Result<Option<Session>, StoreError> {
        Ok(self
            .sessions
            .read()
            .values()
            .find(|s| s.token.access_token == access_token)
            .cloned())
    }

    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Session>, StoreError> {
        let mut found: Vec<Session> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.token.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.token.expires_at.cmp(&b.token.expires_at));
        Ok(found)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.write().remove(id).is_some())
    }

    async fn delete_by_user_id(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut map = self.sessions.write();
        let before = map.len();
        map.retain(|_, s| s.token.user_id != user_id);
        Ok((before - map.len()) as u64)
    }

    async fn set_client_public_key(
        &self,
        id: &str,
        client_public_key: Option<String>,
    ) -> Result<bool, StoreError> {
        match self.sessions.write().get_mut(id) {
            Some(session) => {
                session.keys.client_public_key = client_public_key;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
