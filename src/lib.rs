//! # KATO — multi-tenant pattern-matching and prediction engine
//!
//! KATO ingests streams of multi-modal observations (discrete symbols and
//! continuous vectors), maintains a per-session short-term memory (STM),
//! learns compact patterns from that memory, and — on demand — produces
//! ranked predictions explaining the current STM in terms of previously
//! learned patterns.
//!
//! This crate is the observation → matching → prediction core only:
//! transport, CLI management, container orchestration, logging
//! configuration, metrics shipping, and the real persistent storage
//! backends are external collaborators. The core defines their contracts as
//! traits ([`SessionStore`], [`PatternStore`], [`VectorIndexer`]) and ships
//! in-memory (plus one write-ahead-log-backed) reference implementations.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use kato_core::{Config, Observation, Processor};
//! use kato_core::pattern::InMemoryPatternStore;
//! use kato_core::session::{InMemorySessionStore, SessionStore};
//! use kato_core::vector::{HnswConfig, TenantVectorCollections};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sessions = InMemorySessionStore::new();
//! let patterns = Arc::new(InMemoryPatternStore::new());
//! let vectors = Arc::new(TenantVectorCollections::new(HnswConfig::default()));
//! let processor = Processor::new(vectors, patterns);
//!
//! let session_id = sessions.create("tenant1", Config::default()).await.unwrap();
//! let state = sessions.load(&session_id).await.unwrap();
//!
//! let outcome = processor
//!     .observe(state, Observation { strings: vec!["a".into(), "b".into()], ..Default::default() })
//!     .await
//!     .unwrap();
//! sessions.save(&outcome.state).await.unwrap();
//! # }
//! ```
//!
//! ## Architecture
//!
//! Components, leaves first (see `DESIGN.md` for grounding):
//!
//! 1. [`session`] — durable per-session state (STM, emotives, config) with TTL.
//! 2. [`vector`] — per-tenant ANN collections converting dense vectors to symbols.
//! 3. [`pattern`] — content-addressable pattern store with frequency/emotive
//!    rolling windows and postings/Bloom indexes.
//! 4. [`recall`] — candidate pattern retrieval via ITFDF/Jaccard/cosine similarity.
//! 5. [`prediction`] — alignment, segmentation, and scoring of candidate patterns.
//! 6. [`processor`] — the stateless `(SessionState, Config, Input) -> (SessionState, Output)` facade.
//!
//! Tenant eviction (an LRU over active `node_id`s) lives in [`tenant`].
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod error;
pub mod hashing;
pub mod pattern;
pub mod prediction;
pub mod processor;
pub mod recall;
pub mod session;
pub mod tenant;
pub mod types;
pub mod vector;

pub use config::{Config, SimilarityMetric, StmMode, VectorSimilarityMetric};
pub use error::{KatoError, KatoResult, Warning};
pub use pattern::PatternStore;
pub use prediction::{Prediction, PredictionEngine};
pub use processor::{Observation, ObserveOutcome, Processor};
pub use recall::{RecallCandidate, RecallEngine};
pub use session::SessionStore;
pub use tenant::TenantRegistry;
pub use types::{Event, Pattern, SessionState, Stm};
pub use vector::VectorIndexer;

/// Initialize the logging system at the default (`info`) level.
///
/// Controlled by the `KATO_LOG` environment variable, e.g.
/// `KATO_LOG=debug`. Should be called once at host-process startup.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("KATO_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Initialize logging at an explicit level, ignoring `KATO_LOG`.
pub fn init_logging_with_level(level: &str) {
    let filter = EnvFilter::new(level);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Convenient re-exports for common KATO usage.
pub mod prelude {
    pub use crate::config::{Config, SimilarityMetric, StmMode, VectorSimilarityMetric};
    pub use crate::error::{KatoError, KatoResult, Warning};
    pub use crate::pattern::{InMemoryPatternStore, PatternStore};
    pub use crate::prediction::{Prediction, PredictionEngine};
    pub use crate::processor::{Observation, ObserveOutcome, Processor};
    pub use crate::recall::{RecallCandidate, RecallEngine};
    pub use crate::session::{InMemorySessionStore, SessionStore};
    pub use crate::tenant::TenantRegistry;
    pub use crate::types::{Event, Pattern, SessionState, Stm};
    pub use crate::vector::{HnswConfig, TenantVectorCollections, Vector, VectorIndexer};
}
