//! Embedding-based course retrieval.
//!
//! A loaded [`ModelGeneration`] bundles the feature vocabularies, the numeric
//! scaler, two families of embedding towers and their retrieval indexes:
//!
//! - **content**: course features -> [`ContentTower`] -> nearest courses
//! - **collaborative**: user id -> user [`IdTower`] -> nearest courses embedded by
//!   the jointly trained course [`IdTower`]
//!
//! Generations are immutable once built. [`ModelHandle`] loads one lazily, exactly
//! once, and hands out shared references to it.

use std::path::PathBuf;

pub mod artifacts;
pub mod features;
pub mod generation;
pub mod index;
pub mod layers;
pub mod loader;
pub mod text;
pub mod tower;
pub mod vocab;

#[cfg(test)]
pub(crate) mod fixtures;

pub use features::{CourseFeatures, FeatureEncoder};
pub use generation::{CollaborativeModel, ContentModel, ModelGeneration};
pub use index::{BruteForceIndex, Neighbor, RetrievalIndex, MAX_QUERY_K};
pub use loader::{ArtifactLoader, ModelHandle, ModelLoader};
pub use tower::{ContentTower, IdTower, Tower};
pub use vocab::{NumericScaler, Vocabulary, OOV_INDEX};

/// Errors raised while loading or evaluating a model generation
///
/// Everything except `DimensionMismatch` is a startup failure: the process cannot
/// serve recommendations from a generation that failed to load.
#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("Model artifact missing: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("Failed to read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Incompatible model schema: {0}")]
    Schema(String),

    #[error("Catalog snapshot failed: {0}")]
    Snapshot(String),

    #[error("Model load task failed: {0}")]
    LoadTask(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}
