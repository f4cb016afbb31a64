//! rollcall-store — the face database.
//!
//! Maps application concepts (person name, optional personnel id) onto
//! vector-index operations. The index is pluggable: Qdrant for the real
//! service, an in-process memory index for tests and offline use.

pub mod error;
pub mod facedb;
pub mod index;
pub mod memory;
pub mod qdrant;

pub use error::StoreError;
pub use facedb::{DbStats, FaceDb, FaceMatch, FaceRecord, DEFAULT_SIMILARITY_THRESHOLD};
pub use index::{FacePayload, ScoredHit, VectorIndex};
pub use memory::MemoryIndex;
pub use qdrant::{QdrantIndex, COLLECTION_NAME};
