//! Core data model: events, short-term memory, patterns and session state.
//!
//! Symbols are plain `String`s (two forms: plain strings and
//! `"VCTR|" + hex`); an `Event` is an unordered set of symbols, canonicalized
//! by sorting when `Config::sort` is enabled.
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};

use crate::config::Config;

/// An unordered set of symbols observed together.
///
/// Internal ordering is insignificant except for display/hash
/// determinism; when `sort` is requested the symbols are stored in
/// lexicographic order, which is what makes two occurrences of the same
/// observed set compare and hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The symbols observed together, in canonical (sorted, if
    /// requested) or insertion order.
    pub symbols: Vec<String>,
}

impl Event {
    /// Build an event from symbols, canonicalizing (sorting) if `sort`.
    pub fn new(mut symbols: Vec<String>, sort: bool) -> Self {
        if sort {
            symbols.sort_unstable();
        }
        Self { symbols }
    }

    /// The symbols as a set, for overlap/compatibility checks.
    pub fn symbol_set(&self) -> HashSet<&str> {
        self.symbols.iter().map(|s| s.as_str()).collect()
    }

    /// Number of symbols shared with `other`.
    pub fn overlap_count(&self, other: &Event) -> usize {
        let other_set = other.symbol_set();
        self.symbols
            .iter()
            .filter(|s| other_set.contains(s.as_str()))
            .count()
    }

    /// Whether this event shares at least one symbol with `other`.
    pub fn is_compatible_with(&self, other: &Event) -> bool {
        self.overlap_count(other) > 0
    }

    /// Re-sort this event's symbols in place.
    pub fn canonicalize(&mut self) {
        self.symbols.sort_unstable();
    }
}

/// Short-term memory: an ordered sequence of events for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stm {
    /// The events, in observation order.
    pub events: Vec<Event>,
}

impl Stm {
    /// An empty STM.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events currently held.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the STM holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append an observed event.
    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Number of distinct symbols across all events in the STM.
    pub fn distinct_symbol_count(&self) -> usize {
        self.events
            .iter()
            .flat_map(|e| e.symbols.iter())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Union of symbols across every event, as a set (used by recall as `Q`).
    pub fn symbol_union(&self) -> HashSet<&str> {
        self.events
            .iter()
            .flat_map(|e| e.symbols.iter().map(|s| s.as_str()))
            .collect()
    }

    /// Clear all events.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Retain only the last `n` events (used by `stm_mode = ROLLING`).
    pub fn retain_last(&mut self, n: usize) {
        if self.events.len() > n {
            let drop_count = self.events.len() - n;
            self.events.drain(0..drop_count);
        }
    }
}

/// A learned, canonical sequence of events, addressed by content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// `"PTRN|" + hex_sha1(canonical_serialization(events))`.
    pub name: String,
    /// The canonical event sequence (length >= 2).
    pub events: Vec<Event>,
    /// Times this exact pattern has been learned.
    pub frequency: u64,
    /// Rolling windows of emotive values, bounded by `persistence`.
    pub emotives: HashMap<String, VecDeque<f64>>,
    /// Optional free-form metadata, merged across re-learns.
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl Pattern {
    /// Number of events in the pattern.
    pub fn length(&self) -> usize {
        self.events.len()
    }

    /// Append a value to an emotive's rolling window, evicting from the
    /// front once it exceeds `persistence`.
    pub fn push_emotive(&mut self, name: &str, value: f64, persistence: usize) {
        let window = self.emotives.entry(name.to_string()).or_default();
        window.push_back(value);
        while window.len() > persistence.max(1) {
            window.pop_front();
        }
    }

    /// Arithmetic mean of an emotive's rolling window, if it has any
    /// recorded values.
    pub fn emotive_mean(&self, name: &str) -> Option<f64> {
        let window = self.emotives.get(name)?;
        if window.is_empty() {
            return None;
        }
        Some(window.iter().sum::<f64>() / window.len() as f64)
    }

    /// Means for every emotive key that has at least one recorded value.
    pub fn all_emotive_means(&self) -> HashMap<String, f64> {
        self.emotives
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.clone(), v.iter().sum::<f64>() / v.len() as f64))
            .collect()
    }
}

/// Per-session container threaded through observe/learn/predict.
///
/// Holds no behavior beyond plain data; the [`crate::processor::Processor`]
/// operates on this type as pure functions, so two sessions can be
/// processed concurrently without sharing mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// Unique session identifier.
    pub session_id: String,
    /// Tenant identifier; isolation boundary for patterns and vectors.
    pub node_id: String,
    /// Current short-term memory.
    pub stm: Stm,
    /// Emotive values accumulated since the last learn/clear.
    pub accumulated_emotives: HashMap<String, Vec<f64>>,
    /// Metadata accumulated since the last learn/clear.
    pub accumulated_metadata: HashMap<String, serde_json::Value>,
    /// Monotonic observation counter.
    pub time: u64,
    /// When this session was last written.
    pub last_accessed_at: DateTime<Utc>,
    /// The config this session was created with, threaded through every
    /// subsequent operation unless the caller overrides it per-call.
    pub config: Config,
}

impl SessionState {
    /// Create a fresh session for `node_id` with the given config.
    pub fn new(session_id: impl Into<String>, node_id: impl Into<String>, config: Config) -> Self {
        Self {
            session_id: session_id.into(),
            node_id: node_id.into(),
            stm: Stm::new(),
            accumulated_emotives: HashMap::new(),
            accumulated_metadata: HashMap::new(),
            time: 0,
            last_accessed_at: Utc::now(),
            config,
        }
    }

    /// Merge newly observed emotives into the accumulated map.
    pub fn merge_emotives(&mut self, emotives: &HashMap<String, f64>) {
        for (key, value) in emotives {
            self.accumulated_emotives
                .entry(key.clone())
                .or_default()
                .push(*value);
        }
    }

    /// Merge newly observed metadata into the accumulated map (last
    /// write per key wins).
    pub fn merge_metadata(&mut self, metadata: &HashMap<String, serde_json::Value>) {
        for (key, value) in metadata {
            self.accumulated_metadata.insert(key.clone(), value.clone());
        }
    }

    /// Reset STM, accumulated emotives and metadata (used by `stm_mode =
    /// CLEAR`).
    pub fn clear_stm(&mut self) {
        self.stm.clear();
        self.accumulated_emotives.clear();
        self.accumulated_metadata.clear();
    }
}
