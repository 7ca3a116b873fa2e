//! Content-addressable pattern storage, indexes, and frequency/emotive
//! bookkeeping. `InMemoryPatternStore` keeps three indexes per tenant:
//! primary `name -> Pattern`, inverted postings `symbol -> set<name>`, and a
//! Bloom filter over indexed symbols.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::sync::RwLock;

use crate::hashing::{canonical_events_string, pattern_name, sha1_hex};
use crate::types::{Event, Pattern};

use super::bloom::BloomFilter;

/// Target pattern count the per-tenant Bloom filter is sized for; tenants
/// holding more patterns simply see a rising false-positive rate rather
/// than hitting a hard cap.
const BLOOM_EXPECTED_PATTERNS: usize = 10_000;
/// Target false-positive rate, kept at or below 1%.
const BLOOM_FALSE_POSITIVE_RATE: f64 = 0.01;

/// Content-addressable storage of learned patterns, isolated per tenant.
#[async_trait]
pub trait PatternStore: Send + Sync {
    /// Fetch a pattern by name within `node_id`'s keyspace.
    async fn get(&self, node_id: &str, name: &str) -> Option<Pattern>;

    /// Canonicalize `events`, compute the pattern name, and insert
    /// (`frequency = 1`) or update (frequency/emotives/metadata merged) the
    /// record. Returns `None` without storing anything if `events.len() <
    /// 2`: patterns of a single event are rejected.
    ///
    /// `increment_frequency` lets the caller distinguish a fresh learn
    /// (always increments on re-learn) from a background re-observation
    /// under `always_update_frequencies = false` (caller passes `false` and
    /// the frequency is left untouched on an existing pattern, though a
    /// brand-new pattern is always inserted at `frequency = 1`).
    async fn learn(
        &self,
        node_id: &str,
        events: Vec<Event>,
        emotives: &HashMap<String, Vec<f64>>,
        metadata: &HashMap<String, serde_json::Value>,
        persistence: usize,
        increment_frequency: bool,
    ) -> Option<String>;

    /// Names of patterns whose symbol set intersects `symbols`, pruned by
    /// the tenant's Bloom filter before the postings lookup.
    async fn candidates_by_symbols(&self, node_id: &str, symbols: &HashSet<String>) -> Vec<String>;

    /// Names of patterns whose first event matches `first_event` exactly.
    async fn iter_by_first_event(&self, node_id: &str, first_event: &Event) -> Vec<String>;

    /// Drop every pattern and index entry for `node_id`.
    async fn clear_tenant(&self, node_id: &str);

    /// Total number of patterns stored for `node_id` (`N` in the ITFDF
    /// formula).
    async fn pattern_count(&self, node_id: &str) -> usize;

    /// Number of patterns in `node_id`'s keyspace whose symbol set
    /// contains `symbol` (`freq(s)` in the ITFDF formula).
    async fn symbol_document_frequency(&self, node_id: &str, symbol: &str) -> usize;
}

struct TenantPatterns {
    primary: DashMap<String, Pattern>,
    postings: DashMap<String, DashSet<String>>,
    first_event_index: DashMap<String, DashSet<String>>,
    bloom: RwLock<BloomFilter>,
}

impl TenantPatterns {
    fn new() -> Self {
        Self {
            primary: DashMap::new(),
            postings: DashMap::new(),
            first_event_index: DashMap::new(),
            bloom: RwLock::new(BloomFilter::new(
                BLOOM_EXPECTED_PATTERNS,
                BLOOM_FALSE_POSITIVE_RATE,
            )),
        }
    }
}

fn first_event_key(event: &Event) -> String {
    sha1_hex(canonical_events_string(&[event.symbols.clone()]).as_bytes())
}

/// A `DashMap`-backed, non-durable, per-tenant [`PatternStore`].
#[derive(Default)]
pub struct InMemoryPatternStore {
    tenants: DashMap<String, Arc<TenantPatterns>>,
}

impl InMemoryPatternStore {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn tenant(&self, node_id: &str) -> Arc<TenantPatterns> {
        self.tenants
            .entry(node_id.to_string())
            .or_insert_with(|| Arc::new(TenantPatterns::new()))
            .clone()
    }
}

#[async_trait]
impl PatternStore for InMemoryPatternStore {
    async fn get(&self, node_id: &str, name: &str) -> Option<Pattern> {
        self.tenants
            .get(node_id)?
            .primary
            .get(name)
            .map(|entry| entry.clone())
    }

    async fn learn(
        &self,
        node_id: &str,
        mut events: Vec<Event>,
        emotives: &HashMap<String, Vec<f64>>,
        metadata: &HashMap<String, serde_json::Value>,
        persistence: usize,
        increment_frequency: bool,
    ) -> Option<String> {
        if events.len() < 2 {
            return None;
        }
        for event in &mut events {
            event.canonicalize();
        }

        let name = pattern_name(
            &events
                .iter()
                .map(|e| e.symbols.clone())
                .collect::<Vec<_>>(),
        );
        let tenant = self.tenant(node_id);
        let is_new = !tenant.primary.contains_key(&name);

        tenant
            .primary
            .entry(name.clone())
            .and_modify(|pattern| {
                if increment_frequency {
                    pattern.frequency += 1;
                }
                apply_emotives_and_metadata(pattern, emotives, metadata, persistence);
            })
            .or_insert_with(|| {
                let mut pattern = Pattern {
                    name: name.clone(),
                    events: events.clone(),
                    frequency: 1,
                    emotives: HashMap::new(),
                    metadata: None,
                };
                apply_emotives_and_metadata(&mut pattern, emotives, metadata, persistence);
                pattern
            });

        if is_new {
            for event in &events {
                for symbol in &event.symbols {
                    tenant
                        .postings
                        .entry(symbol.clone())
                        .or_insert_with(DashSet::new)
                        .insert(name.clone());
                    tenant.bloom.write().await.insert(symbol);
                }
            }
            if let Some(first) = events.first() {
                tenant
                    .first_event_index
                    .entry(first_event_key(first))
                    .or_insert_with(DashSet::new)
                    .insert(name.clone());
            }
        }

        Some(name)
    }

    async fn candidates_by_symbols(&self, node_id: &str, symbols: &HashSet<String>) -> Vec<String> {
        let Some(tenant) = self.tenants.get(node_id).map(|t| t.clone()) else {
            return vec![];
        };
        let bloom = tenant.bloom.read().await;
        let mut names = HashSet::new();
        for symbol in symbols {
            if bloom.definitely_not_contain(symbol) {
                continue;
            }
            if let Some(postings) = tenant.postings.get(symbol) {
                for name in postings.iter() {
                    names.insert(name.clone());
                }
            }
        }
        names.into_iter().collect()
    }

    async fn iter_by_first_event(&self, node_id: &str, first_event: &Event) -> Vec<String> {
        let Some(tenant) = self.tenants.get(node_id).map(|t| t.clone()) else {
            return vec![];
        };
        let mut canonical = first_event.clone();
        canonical.canonicalize();
        let key = first_event_key(&canonical);
        tenant
            .first_event_index
            .get(&key)
            .map(|set| set.iter().map(|n| n.clone()).collect())
            .unwrap_or_default()
    }

    async fn clear_tenant(&self, node_id: &str) {
        self.tenants.remove(node_id);
    }

    async fn pattern_count(&self, node_id: &str) -> usize {
        self.tenants
            .get(node_id)
            .map(|t| t.primary.len())
            .unwrap_or(0)
    }

    async fn symbol_document_frequency(&self, node_id: &str, symbol: &str) -> usize {
        self.tenants
            .get(node_id)
            .and_then(|t| t.postings.get(symbol).map(|p| p.len()))
            .unwrap_or(0)
    }
}

fn apply_emotives_and_metadata(
    pattern: &mut Pattern,
    emotives: &HashMap<String, Vec<f64>>,
    metadata: &HashMap<String, serde_json::Value>,
    persistence: usize,
) {
    for (key, values) in emotives {
        for value in values {
            pattern.push_emotive(key, *value, persistence);
        }
    }
    if !metadata.is_empty() {
        let merged = pattern.metadata.get_or_insert_with(HashMap::new);
        for (key, value) in metadata {
            merged.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(symbols: &[&str]) -> Event {
        Event::new(symbols.iter().map(|s| s.to_string()).collect(), false)
    }

    #[tokio::test]
    async fn learn_rejects_single_event_patterns() {
        let store = InMemoryPatternStore::new();
        let name = store
            .learn("t1", vec![event(&["a"])], &HashMap::new(), &HashMap::new(), 5, true)
            .await;
        assert_eq!(name, None);
    }

    #[tokio::test]
    async fn learn_then_get_round_trips() {
        let store = InMemoryPatternStore::new();
        let events = vec![event(&["b", "a"]), event(&["c"])];
        let name = store
            .learn("t1", events, &HashMap::new(), &HashMap::new(), 5, true)
            .await
            .unwrap();
        let pattern = store.get("t1", &name).await.unwrap();
        assert_eq!(pattern.name, name);
        assert_eq!(pattern.frequency, 1);
        // canonicalized: "a" before "b" within the first event
        assert_eq!(pattern.events[0].symbols, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn relearning_same_events_increments_frequency_once() {
        let store = InMemoryPatternStore::new();
        let events = || vec![event(&["a", "b"]), event(&["c", "d"])];
        let name1 = store
            .learn("t1", events(), &HashMap::new(), &HashMap::new(), 5, true)
            .await
            .unwrap();
        let name2 = store
            .learn("t1", events(), &HashMap::new(), &HashMap::new(), 5, true)
            .await
            .unwrap();
        assert_eq!(name1, name2);
        let pattern = store.get("t1", &name1).await.unwrap();
        assert_eq!(pattern.frequency, 2);
    }

    #[tokio::test]
    async fn background_reobservation_does_not_increment_frequency() {
        let store = InMemoryPatternStore::new();
        let events = || vec![event(&["a", "b"]), event(&["c", "d"])];
        let name = store
            .learn("t1", events(), &HashMap::new(), &HashMap::new(), 5, true)
            .await
            .unwrap();
        store
            .learn("t1", events(), &HashMap::new(), &HashMap::new(), 5, false)
            .await;
        let pattern = store.get("t1", &name).await.unwrap();
        assert_eq!(pattern.frequency, 1);
    }

    #[tokio::test]
    async fn emotive_window_truncates_to_persistence() {
        let store = InMemoryPatternStore::new();
        let mut emotives = HashMap::new();
        emotives.insert("joy".to_string(), vec![1.0, 2.0, 3.0, 4.0]);
        let name = store
            .learn(
                "t1",
                vec![event(&["a", "b"]), event(&["c", "d"])],
                &emotives,
                &HashMap::new(),
                2,
                true,
            )
            .await
            .unwrap();
        let pattern = store.get("t1", &name).await.unwrap();
        let window: Vec<f64> = pattern.emotives["joy"].iter().copied().collect();
        assert_eq!(window, vec![3.0, 4.0]);
    }

    #[tokio::test]
    async fn candidates_by_symbols_finds_intersecting_patterns_only() {
        let store = InMemoryPatternStore::new();
        store
            .learn(
                "t1",
                vec![event(&["a", "b"]), event(&["c", "d"])],
                &HashMap::new(),
                &HashMap::new(),
                5,
                true,
            )
            .await;
        store
            .learn(
                "t1",
                vec![event(&["x"]), event(&["y"])],
                &HashMap::new(),
                &HashMap::new(),
                5,
                true,
            )
            .await;

        let query: HashSet<String> = ["a".to_string()].into_iter().collect();
        let candidates = store.candidates_by_symbols("t1", &query).await;
        assert_eq!(candidates.len(), 1);
    }

    #[tokio::test]
    async fn iter_by_first_event_matches_exact_event_only() {
        let store = InMemoryPatternStore::new();
        let name = store
            .learn(
                "t1",
                vec![event(&["a", "b"]), event(&["c", "d"])],
                &HashMap::new(),
                &HashMap::new(),
                5,
                true,
            )
            .await
            .unwrap();

        let matches = store.iter_by_first_event("t1", &event(&["a", "b"])).await;
        assert_eq!(matches, vec![name]);
        assert!(store
            .iter_by_first_event("t1", &event(&["z"]))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn clear_tenant_removes_all_its_patterns() {
        let store = InMemoryPatternStore::new();
        let name = store
            .learn(
                "t1",
                vec![event(&["a", "b"]), event(&["c", "d"])],
                &HashMap::new(),
                &HashMap::new(),
                5,
                true,
            )
            .await
            .unwrap();
        store.clear_tenant("t1").await;
        assert!(store.get("t1", &name).await.is_none());
    }

    #[tokio::test]
    async fn pattern_count_and_document_frequency_reflect_indexed_patterns() {
        let store = InMemoryPatternStore::new();
        store
            .learn(
                "t1",
                vec![event(&["a", "b"]), event(&["c", "d"])],
                &HashMap::new(),
                &HashMap::new(),
                5,
                true,
            )
            .await;
        store
            .learn(
                "t1",
                vec![event(&["a"]), event(&["e"])],
                &HashMap::new(),
                &HashMap::new(),
                5,
                true,
            )
            .await;
        assert_eq!(store.pattern_count("t1").await, 2);
        assert_eq!(store.symbol_document_frequency("t1", "a").await, 2);
        assert_eq!(store.symbol_document_frequency("t1", "d").await, 1);
        assert_eq!(store.pattern_count("unknown_tenant").await, 0);
    }

    #[tokio::test]
    async fn different_tenants_do_not_share_patterns() {
        let store = InMemoryPatternStore::new();
        let events = vec![event(&["a", "b"]), event(&["c", "d"])];
        let name = store
            .learn("t1", events.clone(), &HashMap::new(), &HashMap::new(), 5, true)
            .await
            .unwrap();
        assert!(store.get("t2", &name).await.is_none());
    }
}
