use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OnceCell;

use super::{artifacts::ArtifactDir, generation::ModelGeneration, ModelError};
use crate::db::CourseCatalog;

/// Produces a fully built model generation
#[async_trait::async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> Result<ModelGeneration, ModelError>;
}

/// Loads a generation directory from local disk
///
/// By default the content index is read from the generation's precomputed index
/// artifact. With a catalog attached, the content index is instead rebuilt from a
/// snapshot of the catalog taken at load time.
pub struct ArtifactLoader {
    dir: PathBuf,
    snapshot_catalog: Option<Arc<dyn CourseCatalog>>,
}

impl ArtifactLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            snapshot_catalog: None,
        }
    }

    pub fn with_catalog_snapshot(mut self, catalog: Arc<dyn CourseCatalog>) -> Self {
        self.snapshot_catalog = Some(catalog);
        self
    }
}

#[async_trait::async_trait]
impl ModelLoader for ArtifactLoader {
    async fn load(&self) -> Result<ModelGeneration, ModelError> {
        ArtifactDir::open(&self.dir)?;

        let snapshot = match &self.snapshot_catalog {
            Some(catalog) => Some(
                catalog
                    .list_courses()
                    .await
                    .map_err(|e| ModelError::Snapshot(e.to_string()))?,
            ),
            None => None,
        };

        let dir = self.dir.clone();
        tracing::info!(dir = %dir.display(), "Reading model artifacts");

        // Artifact parsing is CPU and file bound
        tokio::task::spawn_blocking(move || ModelGeneration::from_artifacts(&dir, snapshot.as_deref()))
            .await
            .map_err(|e| ModelError::LoadTask(e.to_string()))?
    }
}

/// Shared, lazily initialised access to the served model generation
///
/// The first caller of [`ModelHandle::get`] runs the loader; concurrent callers
/// wait for that same load and all observe the same generation. A failed load
/// leaves the handle empty so the error surfaces to the caller, which at startup
/// aborts the process.
#[derive(Clone)]
pub struct ModelHandle {
    loader: Arc<dyn ModelLoader>,
    generation: Arc<OnceCell<Arc<ModelGeneration>>>,
}

impl ModelHandle {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            generation: Arc::new(OnceCell::new()),
        }
    }

    pub async fn get(&self) -> Result<Arc<ModelGeneration>, ModelError> {
        let generation = self
            .generation
            .get_or_try_init(|| async {
                let started = Instant::now();
                let generation = self.loader.load().await?;
                tracing::info!(
                    generation = %generation.name(),
                    elapsed_ms = started.elapsed().as_millis(),
                    "Model generation loaded"
                );
                Ok::<_, ModelError>(Arc::new(generation))
            })
            .await?;

        Ok(Arc::clone(generation))
    }

    pub fn is_loaded(&self) -> bool {
        self.generation.initialized()
    }
}
