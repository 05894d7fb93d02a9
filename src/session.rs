//! Per-session retrieval indexes.
//!
//! Every session owns an independent [`RetrievalIndex`]; there is no
//! process-wide index. Callers look a session up by [`SessionId`] and lock
//! its handle for the duration of a build or query, so two sessions never
//! observe each other's document.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::chunk::ChunkingParams;
use crate::index::RetrievalIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// State owned by one user session.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub index: RetrievalIndex,
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// Registry of live sessions, each holding its own index.
pub struct SessionRegistry {
    params: ChunkingParams,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl SessionRegistry {
    /// New sessions chunk documents with `params`.
    pub fn new(params: ChunkingParams) -> Self {
        Self {
            params,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a session with an Empty index.
    pub async fn open(&self) -> SessionId {
        let id = SessionId::new();
        let session = Session {
            id,
            index: RetrievalIndex::new(self.params),
        };
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        info!(session = %id, "session opened");
        id
    }

    pub async fn get(&self, id: SessionId) -> Option<SessionHandle> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// End a session and drop its index. Returns `false` if it was unknown.
    pub async fn end(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!(session = %id, "session ended");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
