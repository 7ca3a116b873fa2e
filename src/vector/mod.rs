//! Vector symbolization: dense vectors in, nearest-neighbor symbols out.
pub mod hnsw;
pub mod index;
pub mod types;

pub use hnsw::{HnswConfig, HnswIndex};
pub use index::{TenantVectorCollections, VectorIndexer};
pub use types::Vector;
