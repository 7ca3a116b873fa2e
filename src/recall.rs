//! Candidate retrieval against the current STM: ITFDF similarity by
//! default, with `jaccard`/`cosine_symbol` as interchangeable drop-ins over
//! the same symbol-set representation.
use std::collections::HashSet;

use crate::config::{Config, SimilarityMetric};
use crate::pattern::PatternStore;
use crate::types::{Pattern, Stm};

/// A candidate pattern surviving recall, with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct RecallCandidate {
    /// The pattern's content-addressed name.
    pub name: String,
    /// Similarity score in `[0, 1]`.
    pub score: f64,
    /// Frequency at the time of recall, carried along to avoid a second
    /// lookup during prediction ranking.
    pub frequency: u64,
}

/// Symbol-set indicator for a pattern: the union of symbols across its
/// events, used identically by all three similarity metrics.
fn pattern_symbol_set(pattern: &Pattern) -> HashSet<&str> {
    pattern
        .events
        .iter()
        .flat_map(|e| e.symbols.iter().map(|s| s.as_str()))
        .collect()
}

/// `idf(s) = ln((N+1)/(freq(s)+1)) + 1`.
fn idf(total_patterns: usize, symbol_doc_frequency: usize) -> f64 {
    ((total_patterns as f64 + 1.0) / (symbol_doc_frequency as f64 + 1.0)).ln() + 1.0
}

async fn itfdf_score(
    store: &dyn PatternStore,
    node_id: &str,
    p: &HashSet<&str>,
    q: &HashSet<&str>,
) -> f64 {
    let total = store.pattern_count(node_id).await;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for symbol in p.union(q) {
        let freq = store.symbol_document_frequency(node_id, symbol).await;
        let weight = idf(total, freq);
        denominator += weight;
        if p.contains(symbol) && q.contains(symbol) {
            numerator += weight;
        }
    }
    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

fn jaccard_score(p: &HashSet<&str>, q: &HashSet<&str>) -> f64 {
    let union = p.union(q).count();
    if union == 0 {
        return 0.0;
    }
    p.intersection(q).count() as f64 / union as f64
}

fn cosine_symbol_score(p: &HashSet<&str>, q: &HashSet<&str>) -> f64 {
    let magnitude = (p.len() as f64).sqrt() * (q.len() as f64).sqrt();
    if magnitude == 0.0 {
        return 0.0;
    }
    p.intersection(q).count() as f64 / magnitude
}

/// Compute the similarity of `p`'s symbol set against `q` under `metric`,
/// consulting `store` for corpus statistics when `metric` is ITFDF.
pub async fn similarity(
    store: &dyn PatternStore,
    node_id: &str,
    pattern: &Pattern,
    query: &HashSet<&str>,
    metric: SimilarityMetric,
) -> f64 {
    let p = pattern_symbol_set(pattern);
    match metric {
        SimilarityMetric::Itfdf => itfdf_score(store, node_id, &p, query).await,
        SimilarityMetric::Jaccard => jaccard_score(&p, query),
        SimilarityMetric::CosineSymbol => cosine_symbol_score(&p, query),
    }
}

/// Pure struct-of-functions recall engine: no mutable state of its own,
/// operating over a `PatternStore` handle, the current STM, and `Config`.
pub struct RecallEngine;

impl RecallEngine {
    /// Return up to `config.max_predictions` candidates scoring at least
    /// `config.recall_threshold`, ranked by score desc, frequency desc, name asc.
    pub async fn recall(
        store: &dyn PatternStore,
        node_id: &str,
        stm: &Stm,
        config: &Config,
    ) -> Vec<RecallCandidate> {
        if stm.len() < 2 || stm.distinct_symbol_count() < 2 {
            return vec![];
        }

        let query_owned: HashSet<String> =
            stm.symbol_union().into_iter().map(|s| s.to_string()).collect();
        let query: HashSet<&str> = query_owned.iter().map(|s| s.as_str()).collect();

        let candidate_names = store.candidates_by_symbols(node_id, &query_owned).await;

        let mut candidates = Vec::with_capacity(candidate_names.len());
        for name in candidate_names {
            let Some(pattern) = store.get(node_id, &name).await else {
                continue;
            };
            let score = similarity(
                store,
                node_id,
                &pattern,
                &query,
                config.similarity_metric,
            )
            .await;
            if score >= config.recall_threshold {
                candidates.push(RecallCandidate {
                    name: pattern.name,
                    score,
                    frequency: pattern.frequency,
                });
            }
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.frequency.cmp(&a.frequency))
                .then_with(|| a.name.cmp(&b.name))
        });
        candidates.truncate(config.max_predictions);
        candidates
    }
}
