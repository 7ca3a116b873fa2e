//! Alignment of a candidate pattern against the current STM, and the
//! segment/metric computation derived from it.
//!
//! The alignment is a longest-common-subsequence over event compatibility
//! (two events are compatible iff their symbol sets intersect), computed by
//! a classic DP with a secondary objective (overlap sum) for ties, and a
//! backtrack that prefers matching as early as possible so the reconstructed
//! alignment has the earliest `i_0`, then the earliest `j_0`.
use std::collections::HashMap;

use crate::config::Config;
use crate::types::{Event, Pattern, Stm};

/// One matched pair `(index in P, index in S)`.
type Pair = (usize, usize);

/// A fully scored prediction for one candidate pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// The candidate pattern's name.
    pub name: String,
    /// `P[0 : i_0]`.
    pub past: Vec<Event>,
    /// `P[i_0 : i_{k-1}+1]`.
    pub present: Vec<Event>,
    /// `P[i_{k-1}+1 : ]`.
    pub future: Vec<Event>,
    /// Symbols present in both the matched region of `P` and `S`.
    pub matches: Vec<String>,
    /// Symbols in `present` of `P` not found in the corresponding `S` events.
    pub missing: Vec<String>,
    /// Symbols in the matched region of `S` not found in the corresponding
    /// `P` events.
    pub extras: Vec<String>,
    /// The recall similarity score for this candidate.
    pub similarity: f64,
    /// `|matches| / total distinct symbols in present of P`.
    pub evidence: f64,
    /// `evidence * frequency_weight`.
    pub confidence: f64,
    /// Disjoint runs in the match minus one; `0` means contiguous.
    pub fragmentation: u32,
    /// `1 / (1 + fragmentation) * similarity * confidence`.
    pub potential: f64,
    /// `|matches| / max(1, |matches| + |extras|)`.
    pub snr: f64,
    /// Per-emotive arithmetic means, keys with an empty window omitted.
    pub emotives_mean: HashMap<String, f64>,
    /// The pattern's frequency at prediction time.
    pub frequency: u64,
}

/// Forward/backward DP table entry: `(longest match length, overlap sum)`
/// achievable from a given `(i, j)` position onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
struct Score(u32, u32);

fn suffix_table(p: &[Event], s: &[Event]) -> Vec<Vec<Score>> {
    let m = p.len();
    let n = s.len();
    let mut g = vec![vec![Score(0, 0); n + 1]; m + 1];
    for i in (0..m).rev() {
        for j in (0..n).rev() {
            let skip_i = g[i + 1][j];
            let skip_j = g[i][j + 1];
            let mut best = if skip_j.0 > skip_i.0 || (skip_j.0 == skip_i.0 && skip_j.1 > skip_i.1) {
                skip_j
            } else {
                skip_i
            };
            if p[i].is_compatible_with(&s[j]) {
                let overlap = p[i].overlap_count(&s[j]) as u32;
                let below = g[i + 1][j + 1];
                let matched = Score(1 + below.0, overlap + below.1);
                if matched.0 > best.0 || (matched.0 == best.0 && matched.1 > best.1) {
                    best = matched;
                }
            }
            g[i][j] = best;
        }
    }
    g
}

/// Reconstruct the optimal alignment, preferring a match over either skip
/// whenever a match achieves the cell's optimal score, so the earliest
/// possible `i_0` (then `j_0`) is chosen among all optimal alignments.
fn backtrack(p: &[Event], s: &[Event], g: &[Vec<Score>]) -> Vec<Pair> {
    let m = p.len();
    let n = s.len();
    let mut pairs = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    while i < m && j < n {
        let here = g[i][j];
        let match_score = if p[i].is_compatible_with(&s[j]) {
            let overlap = p[i].overlap_count(&s[j]) as u32;
            let below = g[i + 1][j + 1];
            Some(Score(1 + below.0, overlap + below.1))
        } else {
            None
        };
        if match_score == Some(here) {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if g[i][j + 1] == here {
            j += 1;
        } else {
            i += 1;
        }
    }
    pairs
}

fn align(p: &[Event], s: &[Event]) -> Vec<Pair> {
    if p.is_empty() || s.is_empty() {
        return vec![];
    }
    let g = suffix_table(p, s);
    backtrack(p, s, &g)
}

/// Append `value` to `into` if not already present, preserving first-seen
/// order: an ordered union across pairs.
fn push_unique(into: &mut Vec<String>, value: &str) {
    if !into.iter().any(|existing| existing == value) {
        into.push(value.to_string());
    }
}

fn fragmentation(pairs: &[Pair]) -> u32 {
    if pairs.len() <= 1 {
        return 0;
    }
    let mut runs = 1u32;
    for window in pairs.windows(2) {
        let (pi, pj) = window[0];
        let (ni, nj) = window[1];
        if ni != pi + 1 || nj != pj + 1 {
            runs += 1;
        }
    }
    runs - 1
}

/// Pure struct-of-functions prediction engine: aligns a candidate pattern
/// against the current STM and derives its segments and metrics.
pub struct PredictionEngine;

impl PredictionEngine {
    /// Build a scored [`Prediction`] for `pattern` against `stm`, given the
    /// `similarity` score already computed by recall. Returns `None` if the
    /// candidate has no compatible events (`present` would be empty) or if
    /// `frequency == 0` (should be unreachable; discarded with a warning).
    pub fn build(pattern: &Pattern, stm: &Stm, similarity: f64, config: &Config) -> Option<Prediction> {
        if pattern.frequency == 0 {
            tracing::warn!(pattern = %pattern.name, "pattern with frequency 0 discarded from prediction");
            return None;
        }

        let p = &pattern.events;
        let s = &stm.events;
        let pairs = align(p, s);
        if pairs.is_empty() {
            return None;
        }

        let i0 = pairs.first().unwrap().0;
        let j0 = pairs.first().unwrap().1;
        let i_last = pairs.last().unwrap().0;
        let j_last = pairs.last().unwrap().1;

        let past = p[0..i0].to_vec();
        let present = p[i0..=i_last].to_vec();
        let future = p[i_last + 1..].to_vec();

        let p_to_s: HashMap<usize, usize> = pairs.iter().copied().collect();
        let s_to_p: HashMap<usize, usize> = pairs.iter().map(|&(i, j)| (j, i)).collect();

        let mut matches = Vec::new();
        let mut missing = Vec::new();
        for i in i0..=i_last {
            if let Some(&j) = p_to_s.get(&i) {
                let s_syms = s[j].symbol_set();
                for sym in &p[i].symbols {
                    if s_syms.contains(sym.as_str()) {
                        push_unique(&mut matches, sym);
                    } else {
                        push_unique(&mut missing, sym);
                    }
                }
            } else {
                for sym in &p[i].symbols {
                    push_unique(&mut missing, sym);
                }
            }
        }

        let mut extras = Vec::new();
        for j in j0..=j_last {
            if let Some(&i) = s_to_p.get(&j) {
                let p_syms = p[i].symbol_set();
                for sym in &s[j].symbols {
                    if !p_syms.contains(sym.as_str()) {
                        push_unique(&mut extras, sym);
                    }
                }
            } else {
                for sym in &s[j].symbols {
                    push_unique(&mut extras, sym);
                }
            }
        }

        let total_present_symbols = present
            .iter()
            .flat_map(|e| e.symbols.iter())
            .collect::<std::collections::HashSet<_>>()
            .len();
        let evidence = if total_present_symbols == 0 {
            0.0
        } else {
            matches.len() as f64 / total_present_symbols as f64
        };

        let frequency_weight = 1.0 - 1.0 / (1.0 + (1.0 + pattern.frequency as f64).ln());
        let confidence = evidence * frequency_weight;

        let frag = fragmentation(&pairs);
        let potential = 1.0 / (1.0 + frag as f64) * similarity * confidence;

        let snr_denominator = (matches.len() + extras.len()).max(1);
        let snr = matches.len() as f64 / snr_denominator as f64;

        let threshold = config.effective_prediction_threshold();
        if potential < threshold {
            return None;
        }

        Some(Prediction {
            name: pattern.name.clone(),
            past,
            present,
            future,
            matches,
            missing,
            extras,
            similarity,
            evidence,
            confidence,
            fragmentation: frag,
            potential,
            snr,
            emotives_mean: pattern.all_emotive_means(),
            frequency: pattern.frequency,
        })
    }

    /// Sort predictions descending by `potential`, tie-broken by
    /// `confidence`, then `frequency`, then ascending `name`; truncate to
    /// `config.max_predictions`.
    pub fn rank(mut predictions: Vec<Prediction>, config: &Config) -> Vec<Prediction> {
        predictions.sort_by(|a, b| {
            b.potential
                .partial_cmp(&a.potential)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| b.frequency.cmp(&a.frequency))
                .then_with(|| a.name.cmp(&b.name))
        });
        predictions.truncate(config.max_predictions);
        predictions
    }
}
