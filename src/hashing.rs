//! Content-addressing helpers: the vector hash and the pattern hash.
//!
//! Both hashes are SHA-1 rendered as lowercase hex. Vectors are canonicalized
//! to `f32` little-endian bytes before hashing so the same vector produces
//! the same symbol regardless of platform; patterns are hashed from their
//! canonical (sorted, per-event) serialization so identical learned event
//! sequences always collide onto the same pattern name.

use sha1::{Digest, Sha1};

/// Prefix for symbols derived from vectors.
pub const VECTOR_SYMBOL_PREFIX: &str = "VCTR|";

/// Prefix for pattern names.
pub const PATTERN_NAME_PREFIX: &str = "PTRN|";

/// Render a vector as canonical little-endian `f32` bytes.
///
/// Implementations MUST canonicalize to `f32` before hashing so that vectors
/// produced from `f64` sources on different platforms still hash
/// identically.
pub fn canonical_vector_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for component in vector {
        bytes.extend_from_slice(&component.to_le_bytes());
    }
    bytes
}

/// Compute the symbol for a vector: `"VCTR|" + sha1_hex(canonical_bytes)`.
pub fn vector_symbol(vector: &[f32]) -> String {
    let bytes = canonical_vector_bytes(vector);
    format!("{VECTOR_SYMBOL_PREFIX}{}", sha1_hex(&bytes))
}

/// Compute the canonical serialization of a sequence of events for pattern
/// hashing: `join("|", [join(",", sorted(event)) for event in events])`.
///
/// `events` must already be canonicalized (sorted) per-event by the caller;
/// this function only joins them.
pub fn canonical_events_string<S: AsRef<str>>(events: &[Vec<S>]) -> String {
    events
        .iter()
        .map(|event| {
            event
                .iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Compute the pattern name: `"PTRN|" + sha1_hex(utf8(canonical_events_string(events)))`.
pub fn pattern_name<S: AsRef<str>>(events: &[Vec<S>]) -> String {
    let canonical = canonical_events_string(events);
    format!("{PATTERN_NAME_PREFIX}{}", sha1_hex(canonical.as_bytes()))
}

/// Lowercase hex SHA-1 of arbitrary bytes.
pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_symbol_is_deterministic() {
        let v = vec![0.1f32, 0.2, 0.3, 0.4];
        let s1 = vector_symbol(&v);
        let s2 = vector_symbol(&v);
        assert_eq!(s1, s2);
        assert!(s1.starts_with(VECTOR_SYMBOL_PREFIX));
    }

    #[test]
    fn vector_symbol_differs_for_different_vectors() {
        let a = vector_symbol(&[0.1, 0.2]);
        let b = vector_symbol(&[0.1, 0.3]);
        assert_ne!(a, b);
    }

    #[test]
    fn pattern_name_matches_spec_example() {
        // events already canonicalized (sorted within each event)
        let events = vec![vec!["a", "b"], vec!["c", "d"]];
        let name = pattern_name(&events);
        assert!(name.starts_with(PATTERN_NAME_PREFIX));
        // deterministic and order sensitive across events
        let reordered = vec![vec!["c", "d"], vec!["a", "b"]];
        assert_ne!(name, pattern_name(&reordered));
    }

    #[test]
    fn canonical_events_string_format() {
        let events = vec![vec!["a", "b"], vec!["c"]];
        assert_eq!(canonical_events_string(&events), "a,b|c");
    }

    #[test]
    fn pattern_name_identity_on_collision() {
        let events = vec![vec!["x", "y"], vec!["z"]];
        assert_eq!(pattern_name(&events), pattern_name(&events));
    }
}
