//! Write-ahead-log-backed `SessionStore`: a single append-only JSONL segment
//! with CRC32-checksummed entries and synchronous flush, so every
//! acknowledged `save` is durable on disk before the caller observes `Ok`.
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{KatoError, KatoResult};
use crate::types::SessionState;

use super::SessionStore;

const DEFAULT_TTL_SECONDS: i64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Op {
    Save,
    Delete,
}

/// One durable record: the operation, the full state (for `Save`), and a
/// CRC32 checksum guarding against a torn write on crash-and-replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogEntry {
    op: Op,
    session_id: String,
    state: Option<SessionState>,
    timestamp: DateTime<Utc>,
    checksum: u32,
}

impl LogEntry {
    fn new(op: Op, session_id: String, state: Option<SessionState>) -> KatoResult<Self> {
        let timestamp = Utc::now();
        let checksum = Self::compute_checksum(&op, &session_id, &state, &timestamp)?;
        Ok(Self {
            op,
            session_id,
            state,
            timestamp,
            checksum,
        })
    }

    fn compute_checksum(
        op: &Op,
        session_id: &str,
        state: &Option<SessionState>,
        timestamp: &DateTime<Utc>,
    ) -> KatoResult<u32> {
        let payload = (op, session_id, state, timestamp);
        let bytes = serde_json::to_vec(&payload)
            .map_err(|e| KatoError::SerializationError(e.to_string()))?;
        Ok(crc32fast::hash(&bytes))
    }

    fn verify(&self) -> KatoResult<()> {
        let expected =
            Self::compute_checksum(&self.op, &self.session_id, &self.state, &self.timestamp)?;
        if expected != self.checksum {
            return Err(KatoError::StorageUnavailable {
                reason: format!("wal entry checksum mismatch for session '{}'", self.session_id),
            });
        }
        Ok(())
    }
}

struct Index {
    state: SessionState,
    expires_at: DateTime<Utc>,
}

/// A durable, single-segment JSONL write-ahead log plus an in-memory index
/// replayed from it on startup. Every `save`/`delete` is appended,
/// checksummed, and flushed to disk (`sync_data`) before the call returns.
pub struct WalSessionStore {
    path: PathBuf,
    file: AsyncMutex<File>,
    index: DashMap<String, Index>,
    ttl: Duration,
}

impl WalSessionStore {
    /// Open (creating if absent) the WAL at `path`, replaying any existing
    /// entries into the in-memory index.
    pub async fn open(path: impl AsRef<Path>) -> KatoResult<Self> {
        Self::open_with_ttl_seconds(path, DEFAULT_TTL_SECONDS).await
    }

    /// Like [`WalSessionStore::open`] with an explicit TTL, in seconds.
    pub async fn open_with_ttl_seconds(
        path: impl AsRef<Path>,
        ttl_seconds: i64,
    ) -> KatoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let ttl = Duration::seconds(ttl_seconds);
        let index = DashMap::new();

        if path.exists() {
            Self::replay(&path, &index, ttl).await?;
        } else if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| KatoError::StorageUnavailable { reason: e.to_string() })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| KatoError::StorageUnavailable { reason: e.to_string() })?;

        Ok(Self {
            path,
            file: AsyncMutex::new(file),
            index,
            ttl,
        })
    }

    async fn replay(
        path: &Path,
        index: &DashMap<String, Index>,
        ttl: Duration,
    ) -> KatoResult<()> {
        let file = File::open(path)
            .await
            .map_err(|e| KatoError::StorageUnavailable { reason: e.to_string() })?;
        let mut lines = BufReader::new(file).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| KatoError::StorageUnavailable { reason: e.to_string() })?
        {
            if line.trim().is_empty() {
                continue;
            }
            let entry: LogEntry = serde_json::from_str(&line)
                .map_err(|e| KatoError::SerializationError(e.to_string()))?;
            entry.verify()?;
            match entry.op {
                Op::Save => {
                    if let Some(state) = entry.state {
                        index.insert(
                            entry.session_id.clone(),
                            Index {
                                state,
                                expires_at: entry.timestamp + ttl,
                            },
                        );
                    }
                }
                Op::Delete => {
                    index.remove(&entry.session_id);
                }
            }
        }
        Ok(())
    }

    async fn append(&self, entry: &LogEntry) -> KatoResult<()> {
        let mut line = serde_json::to_vec(entry)
            .map_err(|e| KatoError::SerializationError(e.to_string()))?;
        line.push(b'\n');
        let mut file = self.file.lock().await;
        file.write_all(&line)
            .await
            .map_err(|e| KatoError::StorageUnavailable { reason: e.to_string() })?;
        file.flush()
            .await
            .map_err(|e| KatoError::StorageUnavailable { reason: e.to_string() })?;
        file.sync_data()
            .await
            .map_err(|e| KatoError::StorageUnavailable { reason: e.to_string() })?;
        Ok(())
    }

    /// The path this store is backed by, for diagnostics/tests.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn not_found(session_id: &str) -> KatoError {
        KatoError::NotFound {
            what: "session".to_string(),
            id: session_id.to_string(),
        }
    }
}

#[async_trait]
impl SessionStore for WalSessionStore {
    async fn create(&self, node_id: &str, config: Config) -> KatoResult<String> {
        let session_id = Uuid::new_v4().to_string();
        let state = SessionState::new(session_id.clone(), node_id, config);
        self.save(&state).await?;
        Ok(session_id)
    }

    async fn load(&self, session_id: &str) -> KatoResult<SessionState> {
        let now = Utc::now();
        match self.index.get(session_id) {
            Some(entry) if entry.expires_at > now => Ok(entry.state.clone()),
            Some(_) => {
                drop(self.index.remove(session_id));
                Err(Self::not_found(session_id))
            }
            None => Err(Self::not_found(session_id)),
        }
    }

    async fn save(&self, state: &SessionState) -> KatoResult<()> {
        let entry = LogEntry::new(Op::Save, state.session_id.clone(), Some(state.clone()))?;
        self.append(&entry).await?;
        self.index.insert(
            state.session_id.clone(),
            Index {
                state: state.clone(),
                expires_at: entry.timestamp + self.ttl,
            },
        );
        Ok(())
    }

    async fn touch(&self, session_id: &str) -> KatoResult<()> {
        let mut state = self.load(session_id).await?;
        state.last_accessed_at = Utc::now();
        self.save(&state).await
    }

    async fn delete(&self, session_id: &str) -> KatoResult<()> {
        let entry = LogEntry::new(Op::Delete, session_id.to_string(), None)?;
        self.append(&entry).await?;
        self.index.remove(session_id);
        Ok(())
    }
}
