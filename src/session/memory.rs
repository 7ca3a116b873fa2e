//! In-memory `SessionStore`: a `DashMap`-backed session table with lazy TTL
//! expiry.
use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{KatoError, KatoResult};
use crate::types::SessionState;

use super::SessionStore;

const DEFAULT_TTL_SECONDS: i64 = 3600;

struct Record {
    state: SessionState,
    expires_at: chrono::DateTime<Utc>,
}

/// A `DashMap`-backed, non-durable session store. Sessions are lost on
/// process restart; suitable for embedding, tests, and benchmarks.
pub struct InMemorySessionStore {
    sessions: DashMap<String, Record>,
    ttl: Duration,
}

impl InMemorySessionStore {
    /// Build a store with the default one-hour TTL.
    pub fn new() -> Self {
        Self::with_ttl_seconds(DEFAULT_TTL_SECONDS)
    }

    /// Build a store with an explicit TTL, in seconds.
    pub fn with_ttl_seconds(ttl_seconds: i64) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    /// Number of sessions currently tracked, including any not yet swept
    /// past expiry.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store currently holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove every session whose TTL has elapsed. Callers may schedule
    /// this periodically; the store never spawns its own background task.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.expires_at <= now)
            .map(|entry| entry.key().clone())
            .collect();
        for session_id in &expired {
            self.sessions.remove(session_id);
        }
        expired.len()
    }

    fn not_found(session_id: &str) -> KatoError {
        KatoError::NotFound {
            what: "session".to_string(),
            id: session_id.to_string(),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, node_id: &str, config: Config) -> KatoResult<String> {
        let session_id = Uuid::new_v4().to_string();
        let state = SessionState::new(session_id.clone(), node_id, config);
        self.sessions.insert(
            session_id.clone(),
            Record {
                state,
                expires_at: Utc::now() + self.ttl,
            },
        );
        Ok(session_id)
    }

    async fn load(&self, session_id: &str) -> KatoResult<SessionState> {
        let now = Utc::now();
        match self.sessions.get(session_id) {
            Some(record) if record.expires_at > now => Ok(record.state.clone()),
            Some(_) => {
                self.sessions.remove(session_id);
                Err(Self::not_found(session_id))
            }
            None => Err(Self::not_found(session_id)),
        }
    }

    async fn save(&self, state: &SessionState) -> KatoResult<()> {
        self.sessions.insert(
            state.session_id.clone(),
            Record {
                state: state.clone(),
                expires_at: Utc::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn touch(&self, session_id: &str) -> KatoResult<()> {
        match self.sessions.get_mut(session_id) {
            Some(mut record) => {
                let now = Utc::now();
                record.state.last_accessed_at = now;
                record.expires_at = now + self.ttl;
                Ok(())
            }
            None => Err(Self::not_found(session_id)),
        }
    }

    async fn delete(&self, session_id: &str) -> KatoResult<()> {
        self.sessions.remove(session_id);
        Ok(())
    }
}
