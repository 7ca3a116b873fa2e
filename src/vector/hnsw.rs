//! Hierarchical Navigable Small World ANN index with a configurable
//! `vector_similarity_metric` knob: euclidean, cosine, dot, manhattan.
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::RwLock;

use crate::config::VectorSimilarityMetric;

use super::types::distance;

/// Tuning parameters for an [`HnswIndex`]. Defaults follow common HNSW
/// presets (Malkov & Yashunin); `ef_search` trades recall for latency.
#[derive(Debug, Clone, Copy)]
pub struct HnswConfig {
    /// Max bidirectional edges per node per layer (layer 0 gets `2*m`).
    pub m: usize,
    /// Candidate list size during construction.
    pub ef_construction: usize,
    /// Candidate list size during search.
    pub ef_search: usize,
    /// Level-generation normalization factor.
    pub m_l: f64,
    /// Distance metric used for both insertion and search.
    pub metric: VectorSimilarityMetric,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 64,
            m_l: 1.0 / (16.0_f64).ln(),
            metric: VectorSimilarityMetric::Euclidean,
        }
    }
}

impl HnswConfig {
    /// Override `m` (and rescale `m_l` to match, keeping `m_l` consistent
    /// with `m`).
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self.m_l = 1.0 / (m.max(2) as f64).ln();
        self
    }

    /// Override the distance metric.
    pub fn with_metric(mut self, metric: VectorSimilarityMetric) -> Self {
        self.metric = metric;
        self
    }
}

struct Node {
    vector: Vec<f32>,
    max_layer: usize,
}

#[derive(Default)]
struct Layer {
    edges: HashMap<String, Vec<String>>,
}

struct Candidate {
    id: String,
    dist: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist
    }
}
impl Eq for Candidate {}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Candidate {
    // Reversed so `BinaryHeap` (a max-heap) behaves as a min-heap on distance.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .partial_cmp(&self.dist)
            .unwrap_or(Ordering::Equal)
    }
}

/// A single-tenant HNSW index over `Vec<f32>` vectors keyed by symbol.
pub struct HnswIndex {
    config: HnswConfig,
    nodes: DashMap<String, Node>,
    layers: Vec<RwLock<Layer>>,
    entry_point: RwLock<Option<String>>,
    max_layer: AtomicUsize,
    rng: Mutex<StdRng>,
}

impl HnswIndex {
    /// Build an empty index with `config`.
    pub fn new(config: HnswConfig) -> Self {
        Self {
            config,
            nodes: DashMap::new(),
            layers: vec![],
            entry_point: RwLock::new(None),
            max_layer: AtomicUsize::new(0),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Number of vectors currently indexed.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn random_layer(&self) -> usize {
        let mut rng = self.rng.lock().expect("hnsw rng poisoned");
        let r: f64 = rng.gen_range(0.0..1.0);
        (-r.ln() * self.config.m_l).floor() as usize
    }

    /// Distance between two raw vectors under this index's metric.
    fn dist(&self, a: &[f32], b: &[f32]) -> f32 {
        distance(a, b, self.config.metric)
    }

    async fn search_layer(
        &self,
        layer: usize,
        query: &[f32],
        entry: &str,
        ef: usize,
    ) -> Vec<Candidate> {
        let mut visited = std::collections::HashSet::new();
        visited.insert(entry.to_string());

        let entry_dist = match self.nodes.get(entry) {
            Some(n) => self.dist(query, &n.vector),
            None => return vec![],
        };

        let mut candidates = BinaryHeap::new();
        candidates.push(Candidate {
            id: entry.to_string(),
            dist: entry_dist,
        });
        let mut found = BinaryHeap::new();
        found.push(Candidate {
            id: entry.to_string(),
            dist: entry_dist,
        });

        while let Some(current) = candidates.pop() {
            let worst_found = found
                .peek()
                .map(|c| c.dist)
                .unwrap_or(f32::INFINITY);
            if current.dist > worst_found && found.len() >= ef {
                break;
            }

            let neighbors: Vec<String> = {
                let layers = self.layers_guard();
                if let Some(layer_lock) = layers.get(layer) {
                    let guard = layer_lock.read().await;
                    guard
                        .edges
                        .get(&current.id)
                        .cloned()
                        .unwrap_or_default()
                } else {
                    vec![]
                }
            };

            for neighbor_id in neighbors {
                if visited.contains(&neighbor_id) {
                    continue;
                }
                visited.insert(neighbor_id.clone());
                let neighbor_dist = match self.nodes.get(&neighbor_id) {
                    Some(n) => self.dist(query, &n.vector),
                    None => continue,
                };
                let worst_found = found.peek().map(|c| c.dist).unwrap_or(f32::INFINITY);
                if found.len() < ef || neighbor_dist < worst_found {
                    candidates.push(Candidate {
                        id: neighbor_id.clone(),
                        dist: neighbor_dist,
                    });
                    found.push(Candidate {
                        id: neighbor_id,
                        dist: neighbor_dist,
                    });
                    if found.len() > ef {
                        found.pop();
                    }
                }
            }
        }

        found.into_sorted_vec()
    }

    fn layers_guard(&self) -> &[RwLock<Layer>] {
        &self.layers
    }

    fn select_neighbors(&self, candidates: Vec<Candidate>, m: usize) -> Vec<String> {
        let mut sorted = candidates;
        sorted.sort_by(|a, b| a.dist.partial_cmp(&b.dist).unwrap_or(Ordering::Equal));
        sorted.into_iter().take(m).map(|c| c.id).collect()
    }

    /// Insert or update a vector under `id` (the caller constructs `id` as
    /// the content hash so re-upsert of the same vector is a no-op replace
    /// rather than a duplicate).
    pub async fn add(&mut self, id: String, vector: Vec<f32>) {
        let layer_count = self.random_layer();
        self.max_layer
            .fetch_max(layer_count, AtomicOrdering::SeqCst);
        while self.layers.len() <= layer_count {
            self.layers.push(RwLock::new(Layer::default()));
        }

        self.nodes.insert(
            id.clone(),
            Node {
                vector: vector.clone(),
                max_layer: layer_count,
            },
        );

        let entry = {
            let guard = self.entry_point.read().await;
            guard.clone()
        };

        let Some(entry_id) = entry else {
            *self.entry_point.write().await = Some(id);
            return;
        };

        if entry_id == id {
            return;
        }

        let mut current_nearest = entry_id.clone();
        let entry_layer = self
            .nodes
            .get(&entry_id)
            .map(|n| n.max_layer)
            .unwrap_or(0);

        for layer in (layer_count + 1..=entry_layer).rev() {
            let found = self
                .search_layer(layer, &vector, &current_nearest, 1)
                .await;
            if let Some(best) = found.first() {
                current_nearest = best.id.clone();
            }
        }

        for layer in (0..=layer_count.min(entry_layer)).rev() {
            let found = self
                .search_layer(layer, &vector, &current_nearest, self.config.ef_construction)
                .await;
            let m = if layer == 0 { self.config.m * 2 } else { self.config.m };
            let neighbors = self.select_neighbors(found, m);

            if let Some(best) = neighbors.first() {
                current_nearest = best.clone();
            }

            if let Some(layer_lock) = self.layers.get(layer) {
                let mut guard = layer_lock.write().await;
                guard.edges.insert(id.clone(), neighbors.clone());
                for neighbor_id in &neighbors {
                    let back_edges = guard.edges.entry(neighbor_id.clone()).or_default();
                    if !back_edges.contains(&id) {
                        back_edges.push(id.clone());
                    }
                    if back_edges.len() > m {
                        let mut scored: Vec<Candidate> = back_edges
                            .iter()
                            .filter_map(|nid| {
                                self.nodes.get(nid).map(|n| Candidate {
                                    id: nid.clone(),
                                    dist: self.dist(&vector, &n.vector),
                                })
                            })
                            .collect();
                        scored.sort_by(|a, b| {
                            a.dist.partial_cmp(&b.dist).unwrap_or(Ordering::Equal)
                        });
                        *back_edges = scored.into_iter().take(m).map(|c| c.id).collect();
                    }
                }
            }
        }

        if layer_count > entry_layer {
            *self.entry_point.write().await = Some(id);
        }
    }

    /// Return up to `k` nearest ids to `query`, ordered nearest-first.
    pub async fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        let entry = {
            let guard = self.entry_point.read().await;
            guard.clone()
        };
        let Some(mut current) = entry else {
            return vec![];
        };

        let top_layer = self
            .nodes
            .get(&current)
            .map(|n| n.max_layer)
            .unwrap_or(0);

        for layer in (1..=top_layer).rev() {
            let found = self.search_layer(layer, query, &current, 1).await;
            if let Some(best) = found.first() {
                current = best.id.clone();
            }
        }

        let ef = self.config.ef_search.max(k);
        let mut found = self.search_layer(0, query, &current, ef).await;
        found.sort_by(|a, b| a.dist.partial_cmp(&b.dist).unwrap_or(Ordering::Equal));
        found.truncate(k);
        found.into_iter().map(|c| (c.id, c.dist)).collect()
    }

    /// Remove a vector from the index. Leaves dangling back-edges from
    /// other nodes to `id` until they are next pruned on insert.
    pub async fn remove(&mut self, id: &str) -> bool {
        let removed = self.nodes.remove(id).is_some();
        if removed {
            for layer_lock in &self.layers {
                let mut guard = layer_lock.write().await;
                guard.edges.remove(id);
                for edges in guard.edges.values_mut() {
                    edges.retain(|e| e != id);
                }
            }
            let mut entry = self.entry_point.write().await;
            if entry.as_deref() == Some(id) {
                *entry = self.nodes.iter().next().map(|n| n.key().clone());
            }
        }
        removed
    }

    /// Drop all vectors and graph edges.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.layers.clear();
        self.max_layer.store(0, AtomicOrdering::SeqCst);
        self.entry_point = RwLock::new(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_search_finds_identical_vector() {
        let mut index = HnswIndex::new(HnswConfig::default());
        index.add("a".to_string(), vec![1.0, 0.0, 0.0]).await;
        index.add("b".to_string(), vec![0.0, 1.0, 0.0]).await;
        index.add("c".to_string(), vec![0.9, 0.1, 0.0]).await;

        let results = index.search(&[1.0, 0.0, 0.0], 1).await;
        assert_eq!(results[0].0, "a");
    }

    #[tokio::test]
    async fn search_on_empty_index_returns_empty() {
        let index = HnswIndex::new(HnswConfig::default());
        assert!(index.search(&[1.0, 0.0], 5).await.is_empty());
    }

    #[tokio::test]
    async fn remove_drops_from_results() {
        let mut index = HnswIndex::new(HnswConfig::default());
        index.add("a".to_string(), vec![1.0, 0.0]).await;
        index.add("b".to_string(), vec![0.0, 1.0]).await;
        assert!(index.remove("a").await);
        let results = index.search(&[1.0, 0.0], 2).await;
        assert!(results.iter().all(|(id, _)| id != "a"));
    }

    #[tokio::test]
    async fn manhattan_metric_orders_by_l1_distance() {
        let config = HnswConfig::default().with_metric(VectorSimilarityMetric::Manhattan);
        let mut index = HnswIndex::new(config);
        index.add("near".to_string(), vec![1.0, 1.0]).await;
        index.add("far".to_string(), vec![5.0, 5.0]).await;
        let results = index.search(&[0.0, 0.0], 1).await;
        assert_eq!(results[0].0, "near");
    }

    #[test]
    fn clear_resets_len_to_zero() {
        let mut index = HnswIndex::new(HnswConfig::default());
        index.clear();
        assert_eq!(index.len(), 0);
        assert!(index.is_empty());
    }
}
