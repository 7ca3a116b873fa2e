//! Tenant eviction: an LRU over active `node_id`s, layered over the
//! already-concurrent `PatternStore`/`VectorIndexer` the same way an access
//! tracker sits beside a cache. Evicting a tenant always drops its vector
//! collection, and additionally drops pattern data for tenants whose
//! `node_id` begins with `test_`.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::pattern::PatternStore;
use crate::vector::VectorIndexer;

/// Default number of tenants kept active before the least-recently-touched
/// one is evicted.
pub const DEFAULT_CAPACITY: usize = 100;

const TEST_TENANT_PREFIX: &str = "test_";

struct Inner {
    /// Least-recently-touched tenant at the front.
    order: VecDeque<String>,
    capacity: usize,
}

/// LRU registry of active tenants, responsible for evicting the least
/// recently touched tenant's vector collection (and, for `test_`-prefixed
/// tenants, its pattern data) once `capacity` is exceeded.
pub struct TenantRegistry {
    inner: Mutex<Inner>,
    pattern_store: Arc<dyn PatternStore>,
    vector_indexer: Arc<dyn VectorIndexer>,
}

impl TenantRegistry {
    /// Build a registry with the default capacity (100).
    pub fn new(pattern_store: Arc<dyn PatternStore>, vector_indexer: Arc<dyn VectorIndexer>) -> Self {
        Self::with_capacity(pattern_store, vector_indexer, DEFAULT_CAPACITY)
    }

    /// Build a registry with an explicit capacity.
    pub fn with_capacity(
        pattern_store: Arc<dyn PatternStore>,
        vector_indexer: Arc<dyn VectorIndexer>,
        capacity: usize,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                order: VecDeque::new(),
                capacity: capacity.max(1),
            }),
            pattern_store,
            vector_indexer,
        }
    }

    /// Record activity for `node_id`, evicting the least-recently-touched
    /// tenant if capacity is now exceeded. Returns the evicted tenant, if
    /// any.
    pub async fn touch(&self, node_id: &str) -> Option<String> {
        let evicted = {
            let mut inner = self.inner.lock().expect("tenant registry mutex poisoned");
            if let Some(pos) = inner.order.iter().position(|n| n == node_id) {
                inner.order.remove(pos);
            }
            inner.order.push_back(node_id.to_string());
            if inner.order.len() > inner.capacity {
                inner.order.pop_front()
            } else {
                None
            }
        };
        if let Some(evicted_id) = &evicted {
            self.evict(evicted_id).await;
        }
        evicted
    }

    async fn evict(&self, node_id: &str) {
        self.vector_indexer.delete_collection(node_id).await;
        if node_id.starts_with(TEST_TENANT_PREFIX) {
            self.pattern_store.clear_tenant(node_id).await;
        }
        tracing::info!(node_id = %node_id, "tenant evicted");
    }

    /// Number of tenants currently tracked as active.
    pub fn active_tenant_count(&self) -> usize {
        self.inner.lock().expect("tenant registry mutex poisoned").order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::InMemoryPatternStore;
    use crate::types::Event;
    use crate::vector::{HnswConfig, TenantVectorCollections, Vector};
    use std::collections::HashMap;

    fn event(symbols: &[&str]) -> Event {
        Event::new(symbols.iter().map(|s| s.to_string()).collect(), true)
    }

    #[tokio::test]
    async fn eviction_fires_once_capacity_exceeded() {
        let patterns: Arc<dyn PatternStore> = Arc::new(InMemoryPatternStore::new());
        let vectors: Arc<dyn VectorIndexer> =
            Arc::new(TenantVectorCollections::new(HnswConfig::default()));
        let registry = TenantRegistry::with_capacity(patterns, vectors, 2);

        assert_eq!(registry.touch("t1").await, None);
        assert_eq!(registry.touch("t2").await, None);
        assert_eq!(registry.touch("t3").await, Some("t1".to_string()));
        assert_eq!(registry.active_tenant_count(), 2);
    }

    #[tokio::test]
    async fn re_touching_a_tenant_keeps_it_from_being_the_next_eviction() {
        let patterns: Arc<dyn PatternStore> = Arc::new(InMemoryPatternStore::new());
        let vectors: Arc<dyn VectorIndexer> =
            Arc::new(TenantVectorCollections::new(HnswConfig::default()));
        let registry = TenantRegistry::with_capacity(patterns, vectors, 2);

        registry.touch("t1").await;
        registry.touch("t2").await;
        registry.touch("t1").await; // t1 is now most-recent; t2 is LRU.
        assert_eq!(registry.touch("t3").await, Some("t2".to_string()));
    }

    #[tokio::test]
    async fn eviction_drops_pattern_data_only_for_test_prefixed_tenants() {
        let pattern_store = Arc::new(InMemoryPatternStore::new());
        let vectors: Arc<dyn VectorIndexer> =
            Arc::new(TenantVectorCollections::new(HnswConfig::default()));
        let patterns: Arc<dyn PatternStore> = pattern_store.clone();
        let registry = TenantRegistry::with_capacity(patterns, vectors, 1);

        pattern_store
            .learn(
                "test_tenant",
                vec![event(&["a", "b"]), event(&["c", "d"])],
                &HashMap::new(),
                &HashMap::new(),
                5,
                true,
            )
            .await;
        pattern_store
            .learn(
                "prod_tenant",
                vec![event(&["a", "b"]), event(&["c", "d"])],
                &HashMap::new(),
                &HashMap::new(),
                5,
                true,
            )
            .await;

        registry.touch("test_tenant").await;
        let evicted_vector_indexer: Arc<dyn VectorIndexer> =
            Arc::new(TenantVectorCollections::new(HnswConfig::default()));
        // Build a second registry sharing the same pattern store so we can
        // drive a real eviction deterministically.
        let registry2 =
            TenantRegistry::with_capacity(pattern_store.clone(), evicted_vector_indexer, 1);
        registry2.touch("test_tenant").await;
        assert_eq!(registry2.touch("prod_tenant").await, Some("test_tenant".to_string()));

        assert_eq!(pattern_store.pattern_count("test_tenant").await, 0);
        assert_eq!(pattern_store.pattern_count("prod_tenant").await, 1);
    }

    #[tokio::test]
    async fn upsert_still_works_through_shared_vector_indexer() {
        let patterns: Arc<dyn PatternStore> = Arc::new(InMemoryPatternStore::new());
        let vector_indexer = Arc::new(TenantVectorCollections::new(HnswConfig::default()));
        let registry = TenantRegistry::with_capacity(patterns, vector_indexer.clone(), 1);
        registry.touch("t1").await;
        let symbol = vector_indexer
            .upsert("t1", &Vector::new(vec![0.1, 0.2]))
            .await
            .unwrap();
        assert!(symbol.starts_with("VCTR|"));
    }
}
