//! Durable per-session state with TTL.
mod memory;
mod wal;

pub use memory::InMemorySessionStore;
pub use wal::WalSessionStore;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::KatoResult;
use crate::types::SessionState;

/// Durable storage contract for [`SessionState`].
///
/// All operations are expected O(1); TTL is refreshed on every write and an
/// expired session fails `load` with [`crate::error::KatoError::NotFound`],
/// exactly as an unknown session would.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a new session for `node_id`, returning its `session_id`.
    async fn create(&self, node_id: &str, config: Config) -> KatoResult<String>;

    /// Load a session by id. Fails with `NotFound` if absent or expired.
    async fn load(&self, session_id: &str) -> KatoResult<SessionState>;

    /// Persist `state`, refreshing its TTL.
    async fn save(&self, state: &SessionState) -> KatoResult<()>;

    /// Refresh `last_accessed_at` and the TTL without altering other fields.
    async fn touch(&self, session_id: &str) -> KatoResult<()>;

    /// Remove a session. Idempotent: deleting an absent session is not an
    /// error, matching last-writer-wins semantics under concurrent TTL
    /// sweeping.
    async fn delete(&self, session_id: &str) -> KatoResult<()>;
}
