//! SkillMatch Vector Search Engine
//!
//! Course dataset cleaning, exact nearest-neighbor index over normalized
//! embeddings, on-disk persistence and the recommendation engine on top

pub mod engine;
pub mod export;
pub mod index;
pub mod persist;
pub mod records;
pub mod types;

pub use engine::{ensure_index, IndexOptions, IndexSource, RecommendationEngine};
pub use export::{summarize, to_rows, write_csv, ResultRow, ResultSummary, RESULT_COLUMNS};
pub use index::{l2_normalize, similarity_from_distance, VectorIndex};
pub use persist::ArtifactPaths;
pub use records::{clean_price, load_and_clean, DatasetFile};
pub use types::{IndexManifest, Item, Neighbor, Price, Recommendation};
