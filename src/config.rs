//! Session-scoped configuration: a closed, enum-valued settings struct.
use serde::{Deserialize, Serialize};

use crate::error::Warning;

/// STM behavior once auto-learn fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StmMode {
    /// Reset STM, accumulated emotives and metadata after auto-learn.
    Clear,
    /// Retain the last `max_pattern_length - 1` events after auto-learn.
    Rolling,
}

impl Default for StmMode {
    fn default() -> Self {
        StmMode::Clear
    }
}

/// Recall similarity metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimilarityMetric {
    /// Inverse-term-frequency / document-frequency weighted overlap.
    Itfdf,
    /// Plain set-intersection-over-union.
    Jaccard,
    /// Cosine similarity over symbol-set indicator vectors.
    CosineSymbol,
}

impl Default for SimilarityMetric {
    fn default() -> Self {
        SimilarityMetric::Itfdf
    }
}

/// Vector ANN distance metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorSimilarityMetric {
    /// L2 distance (default).
    Euclidean,
    /// `1 - cosine_similarity`.
    Cosine,
    /// Negative dot product (higher dot ⇒ closer).
    Dot,
    /// L1 / city-block distance.
    Manhattan,
}

impl Default for VectorSimilarityMetric {
    fn default() -> Self {
        VectorSimilarityMetric::Euclidean
    }
}

/// Session-scoped configuration. Invalid enum values are caught by
/// [`Config::normalize`] rather than failing observations outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// 0 disables auto-learn; else auto-learn fires once STM reaches this
    /// length.
    pub max_pattern_length: usize,
    /// Rolling-window bound for emotives per pattern.
    pub persistence: usize,
    /// Minimum similarity score for a candidate to survive recall.
    pub recall_threshold: f64,
    /// Cap on returned predictions/candidates.
    pub max_predictions: usize,
    /// Reserved: match leniency tuning, currently a no-op.
    pub smoothness: usize,
    /// Reserved: stabilization window, currently a no-op.
    pub quiescence: usize,
    /// Max candidate expansion depth.
    pub search_depth: usize,
    /// Canonicalize event-internal symbol order.
    pub sort: bool,
    /// Enable the PredictionEngine pass.
    pub process_predictions: bool,
    /// Count re-observations of the same pattern as fresh learns.
    pub always_update_frequencies: bool,
    /// STM behavior after auto-learn.
    pub stm_mode: StmMode,
    /// Recall scoring metric.
    pub similarity_metric: SimilarityMetric,
    /// ANN distance metric.
    pub vector_similarity_metric: VectorSimilarityMetric,
    /// Neighbors returned per observed vector.
    pub vector_recall_k: usize,
    /// Overrides `recall_threshold` for prediction filtering when set;
    /// defaults to reusing `recall_threshold` when `None`.
    pub prediction_threshold: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_pattern_length: 0,
            persistence: 5,
            recall_threshold: 0.1,
            max_predictions: 100,
            smoothness: 3,
            quiescence: 3,
            search_depth: 10,
            sort: true,
            process_predictions: true,
            always_update_frequencies: false,
            stm_mode: StmMode::Clear,
            similarity_metric: SimilarityMetric::Itfdf,
            vector_similarity_metric: VectorSimilarityMetric::Euclidean,
            vector_recall_k: 3,
            prediction_threshold: None,
        }
    }
}

impl Config {
    /// The threshold `PredictionEngine` filters on: `prediction_threshold`
    /// if set, else `recall_threshold`.
    pub fn effective_prediction_threshold(&self) -> f64 {
        self.prediction_threshold.unwrap_or(self.recall_threshold)
    }

    /// Clamp numeric fields to their documented minimums, collecting a
    /// [`Warning::ConfigNormalized`] for each field that had to move.
    ///
    /// Enum fields in this struct are closed Rust enums, so there is no
    /// "invalid variant" to catch at this layer — normalization here only
    /// covers numeric bounds (`persistence >= 1`, `max_predictions >= 1`,
    /// `search_depth >= 1`, `smoothness >= 1`, `recall_threshold` clamped to
    /// `[0, 1]`). A host deserializing an out-of-band enum string (e.g. from
    /// JSON) observes the normal serde error at that boundary rather than a
    /// silent default here.
    pub fn normalize(mut self) -> (Config, Vec<Warning>) {
        let mut warnings = Vec::new();

        if self.persistence < 1 {
            warnings.push(Warning::ConfigNormalized {
                field: "persistence".to_string(),
                used_default: "1".to_string(),
            });
            self.persistence = 1;
        }
        if self.max_predictions < 1 {
            warnings.push(Warning::ConfigNormalized {
                field: "max_predictions".to_string(),
                used_default: "1".to_string(),
            });
            self.max_predictions = 1;
        }
        if self.search_depth < 1 {
            warnings.push(Warning::ConfigNormalized {
                field: "search_depth".to_string(),
                used_default: "1".to_string(),
            });
            self.search_depth = 1;
        }
        if self.smoothness < 1 {
            warnings.push(Warning::ConfigNormalized {
                field: "smoothness".to_string(),
                used_default: "1".to_string(),
            });
            self.smoothness = 1;
        }
        if !(0.0..=1.0).contains(&self.recall_threshold) {
            warnings.push(Warning::ConfigNormalized {
                field: "recall_threshold".to_string(),
                used_default: "0.1".to_string(),
            });
            self.recall_threshold = 0.1;
        }

        for w in &warnings {
            w.log();
        }
        (self, warnings)
    }
}
