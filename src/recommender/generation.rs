use std::path::Path;

use ndarray::Array1;

use super::{
    artifacts::{ArtifactDir, CollaborativeVocabularies, ContentVocabularies, Manifest},
    features::FeatureEncoder,
    index::{BruteForceIndex, Neighbor, RetrievalIndex},
    layers::{Dense, EmbeddingTable},
    text::TitleVectorizer,
    tower::{ContentTower, ContentTowerLayers, IdTower, Tower},
    vocab::NumericScaler,
    ModelError,
};
use crate::models::{Course, CourseId};

/// Course-to-course retrieval: encoder, content tower and content index
pub struct ContentModel {
    encoder: FeatureEncoder,
    tower: ContentTower,
    index: Box<dyn RetrievalIndex>,
}

impl ContentModel {
    pub fn new(
        encoder: FeatureEncoder,
        tower: ContentTower,
        index: Box<dyn RetrievalIndex>,
    ) -> Result<Self, ModelError> {
        if index.dimension() != tower.dimension() {
            return Err(ModelError::Schema(format!(
                "content index width {} does not match tower width {}",
                index.dimension(),
                tower.dimension()
            )));
        }
        Ok(Self {
            encoder,
            tower,
            index,
        })
    }

    pub fn embed_course(&self, course: &Course) -> Result<Array1<f32>, ModelError> {
        self.tower.embed(&self.encoder.encode(course))
    }

    /// Top-`k` courses nearest to `course`, which is usually its own first hit
    pub fn similar(&self, course: &Course, k: usize) -> Result<Vec<Neighbor>, ModelError> {
        self.nearest(course, k, None)
    }

    /// Top-`k` courses nearest to `course`, leaving `course` itself out
    pub fn similar_excluding_self(
        &self,
        course: &Course,
        k: usize,
    ) -> Result<Vec<Neighbor>, ModelError> {
        self.nearest(course, k, Some(course.course_id))
    }

    fn nearest(
        &self,
        course: &Course,
        k: usize,
        exclude: Option<CourseId>,
    ) -> Result<Vec<Neighbor>, ModelError> {
        tracing::debug!(
            course_id = course.course_id,
            title_oov_ratio = self.encoder.title().oov_ratio(&course.course_title),
            "Embedding query course"
        );
        let query = self.embed_course(course)?;
        self.index.query_excluding(query.view(), k, exclude)
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn index(&self) -> &dyn RetrievalIndex {
        self.index.as_ref()
    }

    pub fn dimension(&self) -> usize {
        self.tower.dimension()
    }
}

/// User-to-course retrieval over jointly trained id towers
pub struct CollaborativeModel {
    user_tower: IdTower,
    index: Box<dyn RetrievalIndex>,
}

impl CollaborativeModel {
    pub fn new(user_tower: IdTower, index: Box<dyn RetrievalIndex>) -> Result<Self, ModelError> {
        if index.dimension() != user_tower.dimension() {
            return Err(ModelError::Schema(format!(
                "collaborative index width {} does not match user tower width {}",
                index.dimension(),
                user_tower.dimension()
            )));
        }
        Ok(Self { user_tower, index })
    }

    /// Embeds every course token of the course tower into a brute-force index
    ///
    /// Course tokens must be decimal course ids so results can be hydrated.
    pub fn index_course_tower(course_tower: &IdTower) -> Result<BruteForceIndex, ModelError> {
        let entries = course_tower
            .vocabulary()
            .tokens()
            .map(|token| -> Result<(CourseId, Array1<f32>), ModelError> {
                let course_id: CourseId = token.parse().map_err(|_| {
                    ModelError::Schema(format!(
                        "collaborative course token '{}' is not a course id",
                        token
                    ))
                })?;
                Ok((course_id, course_tower.embed(token)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        BruteForceIndex::build(entries, course_tower.dimension())
    }

    /// Top-`k` courses for `user_id`; unknown users share the OOV embedding
    pub fn for_user(&self, user_id: &str, k: usize) -> Result<Vec<Neighbor>, ModelError> {
        let query = self.user_tower.embed(user_id)?;
        self.index.query(query.view(), k)
    }

    pub fn is_known_user(&self, user_id: &str) -> bool {
        self.user_tower.vocabulary().contains(user_id)
    }

    pub fn index(&self) -> &dyn RetrievalIndex {
        self.index.as_ref()
    }

    pub fn dimension(&self) -> usize {
        self.user_tower.dimension()
    }
}

/// One complete, immutable set of vocabularies, weights and indexes
pub struct ModelGeneration {
    manifest: Manifest,
    content: ContentModel,
    collaborative: CollaborativeModel,
}

impl ModelGeneration {
    pub fn new(manifest: Manifest, content: ContentModel, collaborative: CollaborativeModel) -> Self {
        Self {
            manifest,
            content,
            collaborative,
        }
    }

    /// Loads a generation from `dir`
    ///
    /// With `snapshot` the content index is rebuilt from those catalog rows instead
    /// of read from `content/index.json`.
    pub fn from_artifacts(dir: &Path, snapshot: Option<&[Course]>) -> Result<Self, ModelError> {
        let artifacts = ArtifactDir::open(dir)?;
        let manifest = artifacts.manifest()?;

        let content = load_content(&artifacts, &manifest, snapshot)?;
        let collaborative = load_collaborative(&artifacts)?;

        Ok(Self::new(manifest, content, collaborative))
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn name(&self) -> &str {
        &self.manifest.generation
    }

    pub fn content(&self) -> &ContentModel {
        &self.content
    }

    pub fn collaborative(&self) -> &CollaborativeModel {
        &self.collaborative
    }
}

fn load_content(
    artifacts: &ArtifactDir,
    manifest: &Manifest,
    snapshot: Option<&[Course]>,
) -> Result<ContentModel, ModelError> {
    let ContentVocabularies {
        course_ids,
        subjects,
        levels,
        title_tokens,
    } = artifacts.content_vocabularies()?;

    let title = TitleVectorizer::new(title_tokens.tokens, title_tokens.idf, title_tokens.oov_idf)?;
    let scaler = NumericScaler::from_features(artifacts.content_scaler()?.features)?;
    let encoder = FeatureEncoder::new(course_ids, subjects, levels, title, scaler);

    let weights = artifacts.content_weights()?;
    let layers = ContentTowerLayers {
        course_id: EmbeddingTable::from_artifact(weights.course_id_embedding, "course_id_embedding")?,
        subject: EmbeddingTable::from_artifact(weights.subject_embedding, "subject_embedding")?,
        level: EmbeddingTable::from_artifact(weights.level_embedding, "level_embedding")?,
        title_projection: Dense::from_artifact(weights.title_projection, "title_projection")?,
        numeric_projection: Dense::from_artifact(weights.numeric_projection, "numeric_projection")?,
        hidden: Dense::from_artifact(weights.hidden, "hidden")?,
        output: Dense::from_artifact(weights.output, "output")?,
    };
    let tower = ContentTower::new(layers, &encoder, manifest.normalize_output)?;

    let index = match snapshot {
        Some(courses) => {
            tracing::info!(courses = courses.len(), "Building content index from catalog snapshot");
            BruteForceIndex::from_snapshot(courses, &encoder, &tower)?
        }
        None => {
            let entries = artifacts
                .content_index()?
                .entries
                .into_iter()
                .map(|entry| (entry.course_id, Array1::from(entry.embedding)))
                .collect();
            BruteForceIndex::build(entries, tower.dimension())?
        }
    };

    tracing::info!(
        generation = %manifest.generation,
        exported_at = %manifest.exported_at,
        indexed_courses = index.len(),
        "Content index ready; courses added to the catalog after export are not retrievable"
    );

    ContentModel::new(encoder, tower, Box::new(index))
}

fn load_collaborative(artifacts: &ArtifactDir) -> Result<CollaborativeModel, ModelError> {
    let CollaborativeVocabularies {
        user_ids,
        course_ids,
    } = artifacts.collaborative_vocabularies()?;
    let weights = artifacts.collaborative_weights()?;

    let user_tower = IdTower::new(
        user_ids,
        EmbeddingTable::from_artifact(weights.user_embedding, "user_embedding")?,
    )?;
    let course_tower = IdTower::new(
        course_ids,
        EmbeddingTable::from_artifact(weights.course_embedding, "course_embedding")?,
    )?;

    if user_tower.dimension() != course_tower.dimension() {
        return Err(ModelError::Schema(format!(
            "user tower width {} does not match course tower width {}",
            user_tower.dimension(),
            course_tower.dimension()
        )));
    }

    let index = CollaborativeModel::index_course_tower(&course_tower)?;
    tracing::info!(
        users = user_tower.vocabulary().len(),
        indexed_courses = index.len(),
        "Collaborative index ready"
    );

    CollaborativeModel::new(user_tower, Box::new(index))
}
