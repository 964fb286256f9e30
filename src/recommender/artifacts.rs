//! Versioned on-disk layout of a model generation.
//!
//! ```text
//! <generation>/
//!   manifest.json
//!   content/vocabularies.json
//!   content/scaler.json
//!   content/weights.json
//!   content/index.json
//!   collaborative/vocabularies.json
//!   collaborative/weights.json
//! ```
//!
//! Every file is JSON. Vocabularies are plain token lists (row 0 is reserved for
//! OOV, so a list of `n` tokens pairs with an `(n + 1)`-row embedding table).
//! Matrices are `{rows, cols, data}` in row-major order.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{
    layers::{DenseArtifact, MatrixArtifact},
    vocab::{ScaledFeature, Vocabulary},
    ModelError,
};
use crate::models::CourseId;

/// Artifact schema this build understands
pub const SCHEMA_VERSION: u32 = 1;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const CONTENT_VOCABULARIES_FILE: &str = "content/vocabularies.json";
pub const CONTENT_SCALER_FILE: &str = "content/scaler.json";
pub const CONTENT_WEIGHTS_FILE: &str = "content/weights.json";
pub const CONTENT_INDEX_FILE: &str = "content/index.json";
pub const COLLABORATIVE_VOCABULARIES_FILE: &str = "collaborative/vocabularies.json";
pub const COLLABORATIVE_WEIGHTS_FILE: &str = "collaborative/weights.json";

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub generation: String,
    /// When the offline pipeline exported this generation; the content index
    /// reflects the catalog as of this moment
    pub exported_at: DateTime<Utc>,
    /// L2-normalise content embeddings so inner product equals cosine similarity
    #[serde(default)]
    pub normalize_output: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TitleTokens {
    pub tokens: Vocabulary,
    pub idf: Vec<f32>,
    pub oov_idf: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentVocabularies {
    pub course_ids: Vocabulary,
    pub subjects: Vocabulary,
    pub levels: Vocabulary,
    pub title_tokens: TitleTokens,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScalerArtifact {
    pub features: Vec<ScaledFeature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentWeights {
    pub course_id_embedding: MatrixArtifact,
    pub subject_embedding: MatrixArtifact,
    pub level_embedding: MatrixArtifact,
    pub title_projection: DenseArtifact,
    pub numeric_projection: DenseArtifact,
    pub hidden: DenseArtifact,
    pub output: DenseArtifact,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexEntry {
    pub course_id: CourseId,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexArtifact {
    pub entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollaborativeVocabularies {
    pub user_ids: Vocabulary,
    pub course_ids: Vocabulary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollaborativeWeights {
    pub user_embedding: MatrixArtifact,
    pub course_embedding: MatrixArtifact,
}

/// Read access to one generation directory
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    /// Fails if the generation directory itself does not exist
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ModelError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ModelError::MissingArtifact(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads the manifest and checks its schema version
    pub fn manifest(&self) -> Result<Manifest, ModelError> {
        let manifest: Manifest = self.read(MANIFEST_FILE)?;
        if manifest.schema_version != SCHEMA_VERSION {
            return Err(ModelError::Schema(format!(
                "generation '{}' uses schema version {}, expected {}",
                manifest.generation, manifest.schema_version, SCHEMA_VERSION
            )));
        }
        Ok(manifest)
    }

    pub fn content_vocabularies(&self) -> Result<ContentVocabularies, ModelError> {
        self.read(CONTENT_VOCABULARIES_FILE)
    }

    pub fn content_scaler(&self) -> Result<ScalerArtifact, ModelError> {
        self.read(CONTENT_SCALER_FILE)
    }

    pub fn content_weights(&self) -> Result<ContentWeights, ModelError> {
        self.read(CONTENT_WEIGHTS_FILE)
    }

    pub fn content_index(&self) -> Result<IndexArtifact, ModelError> {
        self.read(CONTENT_INDEX_FILE)
    }

    pub fn collaborative_vocabularies(&self) -> Result<CollaborativeVocabularies, ModelError> {
        self.read(COLLABORATIVE_VOCABULARIES_FILE)
    }

    pub fn collaborative_weights(&self) -> Result<CollaborativeWeights, ModelError> {
        self.read(COLLABORATIVE_WEIGHTS_FILE)
    }

    fn read<T: DeserializeOwned>(&self, relative: &str) -> Result<T, ModelError> {
        let path = self.root.join(relative);
        let raw = fs::read_to_string(&path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                ModelError::MissingArtifact(path.clone())
            } else {
                ModelError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        tracing::debug!(path = %path.display(), bytes = raw.len(), "Read model artifact");

        serde_json::from_str(&raw).map_err(|source| ModelError::Parse { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, relative: &str, value: serde_json::Value) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string(&value).unwrap()).unwrap();
    }

    #[test]
    fn test_open_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ArtifactDir::open(tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, ModelError::MissingArtifact(_)));
    }

    #[test]
    fn test_missing_file_is_reported_with_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = ArtifactDir::open(tmp.path()).unwrap();
        match dir.content_scaler().unwrap_err() {
            ModelError::MissingArtifact(path) => assert!(path.ends_with(CONTENT_SCALER_FILE)),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_manifest_schema_version_checked() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            MANIFEST_FILE,
            json!({
                "schema_version": 2,
                "generation": "future",
                "exported_at": "2024-06-01T00:00:00Z"
            }),
        );
        let err = ArtifactDir::open(tmp.path()).unwrap().manifest().unwrap_err();
        assert!(matches!(err, ModelError::Schema(_)));
    }

    #[test]
    fn test_manifest_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            MANIFEST_FILE,
            json!({
                "schema_version": 1,
                "generation": "2024-06-01",
                "exported_at": "2024-06-01T00:00:00Z"
            }),
        );
        let manifest = ArtifactDir::open(tmp.path()).unwrap().manifest().unwrap();
        assert_eq!(manifest.generation, "2024-06-01");
        assert!(!manifest.normalize_output);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(COLLABORATIVE_VOCABULARIES_FILE);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let err = ArtifactDir::open(tmp.path())
            .unwrap()
            .collaborative_vocabularies()
            .unwrap_err();
        assert!(matches!(err, ModelError::Parse { .. }));
    }

    #[test]
    fn test_duplicate_vocabulary_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            COLLABORATIVE_VOCABULARIES_FILE,
            json!({ "user_ids": ["u1", "u1"], "course_ids": ["1"] }),
        );
        let err = ArtifactDir::open(tmp.path())
            .unwrap()
            .collaborative_vocabularies()
            .unwrap_err();
        assert!(matches!(err, ModelError::Parse { .. }));
    }
}
