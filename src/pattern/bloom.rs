//! Bloom filter for fast-negative pattern-candidate pruning: a standard
//! bit-array/k-hash design answering "is this symbol possibly indexed by
//! some pattern in this tenant?"
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// A standard counting-free Bloom filter over symbol strings.
pub struct BloomFilter {
    bits: Vec<bool>,
    k: usize,
    m: usize,
    n: usize,
}

impl BloomFilter {
    /// Size a filter for `expected_items` at a target false-positive rate
    /// in `(0, 1)`, per the standard formulae
    /// `m = -n*ln(p)/(ln(2)^2)`, `k = (m/n)*ln(2)`.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        let expected_items = expected_items.max(1);
        let p = false_positive_rate.clamp(f64::MIN_POSITIVE, 0.5);
        let m = (-(expected_items as f64) * p.ln() / (std::f64::consts::LN_2.powi(2))).ceil()
            as usize;
        let m = m.max(8);
        let k = ((m as f64 / expected_items as f64) * std::f64::consts::LN_2).round() as usize;
        Self::with_dimensions(m, k.max(1))
    }

    /// Build a filter with explicit bit-array size and hash count.
    pub fn with_dimensions(m: usize, k: usize) -> Self {
        Self {
            bits: vec![false; m.max(1)],
            k: k.max(1),
            m: m.max(1),
            n: 0,
        }
    }

    fn hash(&self, item: &str, seed: usize) -> usize {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        item.hash(&mut hasher);
        (hasher.finish() as usize) % self.m
    }

    /// Record `item` as present.
    pub fn insert(&mut self, item: &str) {
        for seed in 0..self.k {
            let idx = self.hash(item, seed);
            self.bits[idx] = true;
        }
        self.n += 1;
    }

    /// Whether `item` might be present (false positives possible).
    pub fn might_contain(&self, item: &str) -> bool {
        (0..self.k).all(|seed| self.bits[self.hash(item, seed)])
    }

    /// Whether `item` is definitely absent (no false negatives).
    pub fn definitely_not_contain(&self, item: &str) -> bool {
        !self.might_contain(item)
    }

    /// Number of items inserted (not deduplicated; re-inserting the same
    /// item twice counts twice even though the bit pattern doesn't change).
    pub fn len(&self) -> usize {
        self.n
    }

    /// Whether nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Approximate memory footprint of the bit array, in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.bits.len() / 8 + 1
    }

    /// Estimated current false-positive rate given `n` insertions:
    /// `(1 - e^(-kn/m))^k`.
    pub fn current_false_positive_rate(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let exponent = -(self.k as f64) * (self.n as f64) / (self.m as f64);
        (1.0 - exponent.exp()).powi(self.k as i32)
    }

    /// Reset to empty, keeping the same dimensions.
    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|b| *b = false);
        self.n = 0;
    }
}
