//! Stateless session processor: a pure-function facade over
//! `(SessionState, Config, Input) -> (SessionState, Output)`. Holds only
//! shared, tenant-scoped collaborators (`VectorIndexer`, `PatternStore`) —
//! never per-session fields — so concurrent calls for different sessions
//! never share mutable state.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;

use crate::config::{Config, StmMode};
use crate::error::{KatoError, KatoResult, Warning};
use crate::hashing::vector_symbol;
use crate::pattern::PatternStore;
use crate::prediction::{Prediction, PredictionEngine};
use crate::recall::RecallEngine;
use crate::types::{Event, SessionState};
use crate::vector::{Vector, VectorIndexer};

/// Per-request deadline for storage/ANN calls: 30 seconds.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// One observation: plain strings, raw vectors, and emotive/metadata
/// payloads observed together as a single event.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    /// Plain symbols observed directly.
    pub strings: Vec<String>,
    /// Dense vectors to be resolved to symbols via the vector indexer.
    pub vectors: Vec<Vec<f32>>,
    /// Emotive values to merge into the session's accumulated emotives.
    pub emotives: HashMap<String, f64>,
    /// Metadata to merge into the session's accumulated metadata.
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Result of an `observe` call: the updated session state, the pattern
/// learned by auto-learn (if any fired), and any non-fatal warnings.
#[derive(Debug, Clone)]
pub struct ObserveOutcome {
    /// The session state after this observation (and any auto-learn).
    pub state: SessionState,
    /// The pattern name learned by auto-learn, if `max_pattern_length`
    /// triggered it this call.
    pub learned_pattern: Option<String>,
    /// Recoverable conditions encountered (config normalization, vector
    /// backend degradation) — also already emitted via `tracing::warn!`.
    pub warnings: Vec<Warning>,
}

/// Stateless facade over `VectorIndexer` and `PatternStore`, implementing
/// `observe`, `learn`, `predict`, `clear_stm`, `clear_all`.
pub struct Processor {
    vector_indexer: Arc<dyn VectorIndexer>,
    pattern_store: Arc<dyn PatternStore>,
    deadline: Duration,
}

impl Processor {
    /// Build a processor with the default 30s per-call deadline.
    pub fn new(vector_indexer: Arc<dyn VectorIndexer>, pattern_store: Arc<dyn PatternStore>) -> Self {
        Self::with_deadline(vector_indexer, pattern_store, DEFAULT_DEADLINE)
    }

    /// Build a processor with an explicit per-call deadline.
    pub fn with_deadline(
        vector_indexer: Arc<dyn VectorIndexer>,
        pattern_store: Arc<dyn PatternStore>,
        deadline: Duration,
    ) -> Self {
        Self {
            vector_indexer,
            pattern_store,
            deadline,
        }
    }

    /// Resolve a single observed vector to the event's symbol set addition:
    /// the new content-hash symbol plus up to `k` nearest existing symbols.
    /// On a search timeout, degrades to the new symbol alone.
    async fn resolve_vector(
        &self,
        node_id: &str,
        raw: &[f32],
        k: usize,
        warnings: &mut Vec<Warning>,
    ) -> KatoResult<Vec<String>> {
        let vector = Vector::new(raw.to_vec());
        let symbol = vector_symbol(&vector.data);

        let nearest = if k == 0 {
            vec![]
        } else {
            match timeout(self.deadline, self.vector_indexer.search(node_id, &vector, k)).await {
                Ok(Ok(found)) => found,
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    let warning = Warning::VectorBackendDegraded {
                        node_id: node_id.to_string(),
                    };
                    warning.log();
                    warnings.push(warning);
                    vec![]
                }
            }
        };

        match timeout(self.deadline, self.vector_indexer.upsert(node_id, &vector)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                let warning = Warning::VectorBackendDegraded {
                    node_id: node_id.to_string(),
                };
                warning.log();
                warnings.push(warning);
            }
        }

        let mut symbols = vec![symbol.clone()];
        for candidate in nearest {
            if candidate != symbol && !symbols.contains(&candidate) {
                symbols.push(candidate);
            }
        }
        Ok(symbols)
    }

    /// Observe one event: canonicalize strings, resolve vectors to symbols,
    /// append to STM, merge emotives/metadata, and auto-learn if
    /// `max_pattern_length` is reached. Fails atomically — on error no
    /// mutated state is returned.
    pub async fn observe(
        &self,
        mut state: SessionState,
        observation: Observation,
    ) -> KatoResult<ObserveOutcome> {
        let (config, normalize_warnings) = state.config.clone().normalize();
        state.config = config.clone();
        let mut warnings = normalize_warnings;

        let mut symbols = observation.strings.clone();
        for raw in &observation.vectors {
            let resolved = self
                .resolve_vector(&state.node_id, raw, config.vector_recall_k, &mut warnings)
                .await?;
            symbols.extend(resolved);
        }

        let event = Event::new(symbols, config.sort);
        state.stm.push(event);
        state.merge_emotives(&observation.emotives);
        state.merge_metadata(&observation.metadata);
        state.time += 1;
        state.last_accessed_at = Utc::now();

        let mut learned_pattern = None;
        if config.max_pattern_length > 0 && state.stm.len() >= config.max_pattern_length {
            let (name, new_state) = self.learn_internal(state, &config).await?;
            learned_pattern = name;
            state = new_state;
        }

        Ok(ObserveOutcome {
            state,
            learned_pattern,
            warnings,
        })
    }

    async fn learn_internal(
        &self,
        mut state: SessionState,
        config: &Config,
    ) -> KatoResult<(Option<String>, SessionState)> {
        if state.stm.len() < 2 || state.stm.distinct_symbol_count() < 2 {
            return Ok((None, state));
        }

        let events = state.stm.events.clone();
        let emotives = state.accumulated_emotives.clone();
        let metadata = state.accumulated_metadata.clone();

        let name = match timeout(
            self.deadline,
            self.pattern_store.learn(
                &state.node_id,
                events,
                &emotives,
                &metadata,
                config.persistence,
                true,
            ),
        )
        .await
        {
            Ok(name) => name,
            Err(_) => {
                return Err(KatoError::StorageUnavailable {
                    reason: "pattern store learn timed out".to_string(),
                })
            }
        };

        match config.stm_mode {
            StmMode::Clear => state.clear_stm(),
            StmMode::Rolling => {
                let keep = config.max_pattern_length.saturating_sub(1);
                state.stm.retain_last(keep);
                state.accumulated_emotives.clear();
                state.accumulated_metadata.clear();
            }
        }

        Ok((name, state))
    }

    /// Explicitly learn the current STM as a pattern. No-op (returns `None`)
    /// if the STM has fewer than two events or fewer than two distinct
    /// symbols.
    pub async fn learn(&self, state: SessionState) -> KatoResult<(Option<String>, SessionState)> {
        let config = state.config.clone();
        self.learn_internal(state, &config).await
    }

    /// Compute ranked predictions for the current STM. Read-only: returns
    /// predictions without mutating `state`.
    pub async fn predict(&self, state: &SessionState) -> KatoResult<Vec<Prediction>> {
        let (config, _) = state.config.clone().normalize();
        if !config.process_predictions {
            return Ok(vec![]);
        }

        let candidates = match timeout(
            self.deadline,
            RecallEngine::recall(self.pattern_store.as_ref(), &state.node_id, &state.stm, &config),
        )
        .await
        {
            Ok(candidates) => candidates,
            Err(_) => {
                return Err(KatoError::StorageUnavailable {
                    reason: "recall timed out".to_string(),
                })
            }
        };

        let mut predictions = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let pattern = match timeout(
                self.deadline,
                self.pattern_store.get(&state.node_id, &candidate.name),
            )
            .await
            {
                Ok(Some(pattern)) => pattern,
                Ok(None) => continue,
                Err(_) => {
                    return Err(KatoError::StorageUnavailable {
                        reason: "pattern fetch timed out".to_string(),
                    })
                }
            };
            if let Some(prediction) =
                PredictionEngine::build(&pattern, &state.stm, candidate.score, &config)
            {
                predictions.push(prediction);
            }
        }

        Ok(PredictionEngine::rank(predictions, &config))
    }

    /// Reset the session's STM, accumulated emotives, and metadata.
    pub fn clear_stm(&self, mut state: SessionState) -> SessionState {
        state.clear_stm();
        state
    }

    /// Drop every pattern and vector-collection entry for `node_id`.
    pub async fn clear_all(&self, node_id: &str) {
        self.pattern_store.clear_tenant(node_id).await;
        self.vector_indexer.delete_collection(node_id).await;
    }
}
