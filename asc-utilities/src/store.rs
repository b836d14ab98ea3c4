//! Per-client session storage

use crate::cache::{Expiration, MemoryCache};
use crate::error::{SessionError, SessionResult};
use crate::session::ByteStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Opaque session identifier carried by the client cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| SessionError::InvalidSessionId(s.to_string()))
    }
}

/// Backend holding the byte entries of many sessions
pub trait SessionStore: Send + Sync + fmt::Debug {
    fn try_get(&self, id: &SessionId, key: &str) -> SessionResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, creating the session if needed
    fn set(&self, id: &SessionId, key: &str, value: Vec<u8>) -> SessionResult<()>;

    fn remove(&self, id: &SessionId, key: &str) -> SessionResult<()>;

    /// Drop every entry of the session
    fn clear(&self, id: &SessionId) -> SessionResult<()>;

    fn keys(&self, id: &SessionId) -> SessionResult<Vec<String>>;

    /// Whether the session holds live data
    fn exists(&self, id: &SessionId) -> SessionResult<bool>;

    /// Refresh the idle timeout of a live session; returns whether it exists
    fn touch(&self, id: &SessionId) -> SessionResult<bool>;

    /// Remove expired sessions, returning how many were dropped
    fn purge_expired(&self) -> SessionResult<usize>;
}

/// Handle to one client's session, handed to request handlers
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    store: Arc<dyn SessionStore>,
}

impl Session {
    pub fn new(id: SessionId, store: Arc<dyn SessionStore>) -> Self {
        Self { id, store }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn keys(&self) -> SessionResult<Vec<String>> {
        self.store.keys(&self.id)
    }

    pub fn clear(&self) -> SessionResult<()> {
        self.store.clear(&self.id)
    }

    pub fn exists(&self) -> SessionResult<bool> {
        self.store.exists(&self.id)
    }
}

impl ByteStore for Session {
    fn try_get(&self, key: &str) -> SessionResult<Option<Vec<u8>>> {
        self.store.try_get(&self.id, key)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> SessionResult<()> {
        self.store.set(&self.id, key, value)
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        self.store.remove(&self.id, key)
    }
}

/// In-process session store with a sliding idle timeout per session
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    sessions: MemoryCache<SessionId, HashMap<String, Vec<u8>>>,
}

impl MemorySessionStore {
    pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

    pub fn new(idle_timeout: Duration) -> Self {
        Self::with_capacity(idle_timeout, Self::DEFAULT_MAX_SESSIONS)
    }

    pub fn with_capacity(idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: MemoryCache::new(max_sessions, Expiration::Sliding(idle_timeout)),
        }
    }

    /// Number of stored sessions, including expired ones not yet purged
    pub fn session_count(&self) -> SessionResult<usize> {
        Ok(self.sessions.len()?)
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(20 * 60))
    }
}

impl SessionStore for MemorySessionStore {
    fn try_get(&self, id: &SessionId, key: &str) -> SessionResult<Option<Vec<u8>>> {
        Ok(self
            .sessions
            .with_entry(id, |data| data.get(key).cloned())?
            .flatten())
    }

    fn set(&self, id: &SessionId, key: &str, value: Vec<u8>) -> SessionResult<()> {
        self.sessions.upsert(*id, HashMap::new, |data| {
            data.insert(key.to_string(), value);
        })?;
        Ok(())
    }

    fn remove(&self, id: &SessionId, key: &str) -> SessionResult<()> {
        self.sessions.with_entry(id, |data| {
            data.remove(key);
        })?;
        Ok(())
    }

    fn clear(&self, id: &SessionId) -> SessionResult<()> {
        self.sessions.remove(id)?;
        debug!("Session cleared: {}", id);
        Ok(())
    }

    fn keys(&self, id: &SessionId) -> SessionResult<Vec<String>> {
        let mut keys = self
            .sessions
            .with_entry(id, |data| data.keys().cloned().collect::<Vec<_>>())?
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    fn exists(&self, id: &SessionId) -> SessionResult<bool> {
        Ok(self.sessions.contains_key(id)?)
    }

    fn touch(&self, id: &SessionId) -> SessionResult<bool> {
        Ok(self.sessions.with_entry(id, |_| ())?.is_some())
    }

    fn purge_expired(&self) -> SessionResult<usize> {
        Ok(self.sessions.purge_expired()?)
    }
}
