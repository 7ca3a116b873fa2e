//! Content-addressable pattern storage and its indexes.
pub mod bloom;
pub mod store;

pub use bloom::BloomFilter;
pub use store::{InMemoryPatternStore, PatternStore};
