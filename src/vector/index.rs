//! Per-tenant ANN collections: one HNSW index, and one fixed dimension, per
//! tenant namespace.
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::error::{KatoError, KatoResult};
use crate::hashing::vector_symbol;

use super::hnsw::{HnswConfig, HnswIndex};
use super::types::Vector;

/// Contract for converting vectors into symbolic ids via ANN search,
/// isolated per tenant.
#[async_trait]
pub trait VectorIndexer: Send + Sync {
    /// Compute `vector`'s content symbol and insert it into `node_id`'s
    /// collection if absent. Idempotent: re-upserting the same vector
    /// returns the same symbol without duplicating the point.
    async fn upsert(&self, node_id: &str, vector: &Vector) -> KatoResult<String>;

    /// Return up to `k` nearest existing symbols to `vector` in `node_id`'s
    /// collection, nearest first.
    async fn search(&self, node_id: &str, vector: &Vector, k: usize) -> KatoResult<Vec<String>>;

    /// Drop `node_id`'s entire collection (used during eviction/`clear_all`).
    async fn delete_collection(&self, node_id: &str);
}

/// A `DashMap`-backed collection-per-tenant [`VectorIndexer`] over
/// [`HnswIndex`]. Each tenant's dimension is fixed on first insert;
/// subsequent inserts of a different dimension fail with
/// [`KatoError::DimensionMismatch`] rather than corrupting the index.
pub struct TenantVectorCollections {
    collections: DashMap<String, Arc<RwLock<HnswIndex>>>,
    dimensions: DashMap<String, usize>,
    config: HnswConfig,
}

impl TenantVectorCollections {
    /// Build an empty registry; every tenant's HNSW index is constructed
    /// with `config` on first insert.
    pub fn new(config: HnswConfig) -> Self {
        Self {
            collections: DashMap::new(),
            dimensions: DashMap::new(),
            config,
        }
    }

    fn collection_for(&self, node_id: &str) -> Arc<RwLock<HnswIndex>> {
        self.collections
            .entry(node_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(HnswIndex::new(self.config))))
            .clone()
    }

    fn check_dimension(&self, node_id: &str, dim: usize) -> KatoResult<()> {
        let fixed = *self
            .dimensions
            .entry(node_id.to_string())
            .or_insert(dim);
        if fixed != dim {
            return Err(KatoError::DimensionMismatch {
                node_id: node_id.to_string(),
                expected: fixed,
                actual: dim,
            });
        }
        Ok(())
    }

    /// Number of tenants with at least one non-empty collection recorded.
    pub fn tenant_count(&self) -> usize {
        self.collections.len()
    }
}

#[async_trait]
impl VectorIndexer for TenantVectorCollections {
    async fn upsert(&self, node_id: &str, vector: &Vector) -> KatoResult<String> {
        self.check_dimension(node_id, vector.dim())?;
        let symbol = vector_symbol(&vector.data);
        let collection = self.collection_for(node_id);
        let mut index = collection.write().await;
        index.add(symbol.clone(), vector.data.clone()).await;
        Ok(symbol)
    }

    async fn search(&self, node_id: &str, vector: &Vector, k: usize) -> KatoResult<Vec<String>> {
        if k == 0 {
            return Ok(vec![]);
        }
        self.check_dimension(node_id, vector.dim())?;
        let collection = self.collection_for(node_id);
        let index = collection.read().await;
        Ok(index
            .search(&vector.data, k)
            .await
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    async fn delete_collection(&self, node_id: &str) {
        self.collections.remove(node_id);
        self.dimensions.remove(node_id);
    }
}
