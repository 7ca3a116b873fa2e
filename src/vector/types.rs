//! Dense vector type and the distance functions behind `vector_similarity_metric`.
use serde::{Deserialize, Serialize};

use crate::config::VectorSimilarityMetric;

/// A dense vector observed by a tenant. Dimension is fixed per tenant
/// collection on first insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    /// The raw components, always `f32` — the content hash is defined over
    /// `f32` little-endian bytes, so higher-precision inputs must be
    /// downcast before this point.
    pub data: Vec<f32>,
}

impl Vector {
    /// Wrap raw components.
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// The vector's dimension.
    pub fn dim(&self) -> usize {
        self.data.len()
    }
}

/// Euclidean (L2) distance.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Manhattan (L1 / city-block) distance.
pub fn manhattan_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// Dot product.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity in `[-1, 1]`; `0.0` if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let mag_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

/// The distance used to order HNSW candidates for `metric`: smaller is
/// always "closer", so `dot` is negated (higher raw dot product ⇒ smaller
/// distance) and `cosine` is `1 - cosine_similarity`.
pub fn distance(a: &[f32], b: &[f32], metric: VectorSimilarityMetric) -> f32 {
    match metric {
        VectorSimilarityMetric::Euclidean => euclidean_distance(a, b),
        VectorSimilarityMetric::Cosine => 1.0 - cosine_similarity(a, b),
        VectorSimilarityMetric::Dot => -dot_product(a, b),
        VectorSimilarityMetric::Manhattan => manhattan_distance(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euclidean_distance_of_identical_vectors_is_zero() {
        assert_eq!(euclidean_distance(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn manhattan_distance_sums_absolute_differences() {
        assert_eq!(manhattan_distance(&[0.0, 0.0], &[3.0, 4.0]), 7.0);
    }

    #[test]
    fn cosine_similarity_of_parallel_vectors_is_one() {
        let sim = cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_guards_zero_magnitude() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn dot_distance_is_negated_so_closer_scores_lower() {
        let close = distance(&[1.0, 1.0], &[1.0, 1.0], VectorSimilarityMetric::Dot);
        let far = distance(&[1.0, 1.0], &[0.1, 0.1], VectorSimilarityMetric::Dot);
        assert!(close < far);
    }
}
