use ndarray::{concatenate, Array1, Axis};

use super::{
    features::{CourseFeatures, FeatureEncoder},
    layers::{l2_normalize, Dense, EmbeddingTable},
    vocab::Vocabulary,
    ModelError,
};

/// An embedding function with loaded, fixed weights
///
/// Implementations are pure: the same input always produces the same vector.
pub trait Tower: Send + Sync {
    type Input: ?Sized;

    fn embed(&self, input: &Self::Input) -> Result<Array1<f32>, ModelError>;

    /// Width of the produced vectors
    fn dimension(&self) -> usize;
}

/// Retrieval-style tower: a vocabulary lookup followed by an embedding row
///
/// Used for both the user tower and the course tower of the collaborative model.
#[derive(Debug, Clone)]
pub struct IdTower {
    vocabulary: Vocabulary,
    embedding: EmbeddingTable,
}

impl IdTower {
    pub fn new(vocabulary: Vocabulary, embedding: EmbeddingTable) -> Result<Self, ModelError> {
        if embedding.rows() != vocabulary.size() {
            return Err(ModelError::Schema(format!(
                "embedding has {} rows for a vocabulary of {} tokens (+1 OOV)",
                embedding.rows(),
                vocabulary.len()
            )));
        }
        Ok(Self {
            vocabulary,
            embedding,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

impl Tower for IdTower {
    type Input = str;

    fn embed(&self, token: &str) -> Result<Array1<f32>, ModelError> {
        let row = self.vocabulary.lookup(token);
        Ok(self.embedding.lookup(row)?.to_owned())
    }

    fn dimension(&self) -> usize {
        self.embedding.dimension()
    }
}

/// Weights making up a [`ContentTower`]
pub struct ContentTowerLayers {
    pub course_id: EmbeddingTable,
    pub subject: EmbeddingTable,
    pub level: EmbeddingTable,
    pub title_projection: Dense,
    pub numeric_projection: Dense,
    pub hidden: Dense,
    pub output: Dense,
}

/// Content-style course tower
///
/// Per-field embeddings (course id, subject, level), a projection of the title
/// TF-IDF vector and a projection of the scaled numerics are concatenated in that
/// order and fused by two dense layers.
#[derive(Debug, Clone)]
pub struct ContentTower {
    course_id: EmbeddingTable,
    subject: EmbeddingTable,
    level: EmbeddingTable,
    title_projection: Dense,
    numeric_projection: Dense,
    hidden: Dense,
    output: Dense,
    normalize_output: bool,
}

impl ContentTower {
    /// Checks every layer shape against the encoder that will feed the tower
    pub fn new(
        layers: ContentTowerLayers,
        encoder: &FeatureEncoder,
        normalize_output: bool,
    ) -> Result<Self, ModelError> {
        expect_rows("course_id_embedding", &layers.course_id, encoder.course_ids())?;
        expect_rows("subject_embedding", &layers.subject, encoder.subjects())?;
        expect_rows("level_embedding", &layers.level, encoder.levels())?;
        expect_input("title_projection", &layers.title_projection, encoder.title().width())?;
        expect_input(
            "numeric_projection",
            &layers.numeric_projection,
            encoder.scaler().width(),
        )?;

        let fused = layers.course_id.dimension()
            + layers.subject.dimension()
            + layers.level.dimension()
            + layers.title_projection.output_dim()
            + layers.numeric_projection.output_dim();
        expect_input("hidden", &layers.hidden, fused)?;
        expect_input("output", &layers.output, layers.hidden.output_dim())?;

        Ok(Self {
            course_id: layers.course_id,
            subject: layers.subject,
            level: layers.level,
            title_projection: layers.title_projection,
            numeric_projection: layers.numeric_projection,
            hidden: layers.hidden,
            output: layers.output,
            normalize_output,
        })
    }
}

impl Tower for ContentTower {
    type Input = CourseFeatures;

    fn embed(&self, features: &CourseFeatures) -> Result<Array1<f32>, ModelError> {
        let title = self.title_projection.forward(features.title.view())?;
        let numeric = self.numeric_projection.forward(features.numeric.view())?;

        let fused = concatenate(
            Axis(0),
            &[
                self.course_id.lookup(features.course_id)?,
                self.subject.lookup(features.subject)?,
                self.level.lookup(features.level)?,
                title.view(),
                numeric.view(),
            ],
        )
        .map_err(|e| ModelError::Schema(format!("failed to fuse content features: {}", e)))?;

        let hidden = self.hidden.forward(fused.view())?;
        let mut embedding = self.output.forward(hidden.view())?;
        if self.normalize_output {
            l2_normalize(&mut embedding);
        }
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.output.output_dim()
    }
}

fn expect_rows(name: &str, table: &EmbeddingTable, vocabulary: &Vocabulary) -> Result<(), ModelError> {
    if table.rows() != vocabulary.size() {
        return Err(ModelError::Schema(format!(
            "{} has {} rows, vocabulary needs {}",
            name,
            table.rows(),
            vocabulary.size()
        )));
    }
    Ok(())
}

fn expect_input(name: &str, layer: &Dense, width: usize) -> Result<(), ModelError> {
    if layer.input_dim() != width {
        return Err(ModelError::Schema(format!(
            "{} expects {} inputs, feature width is {}",
            name,
            layer.input_dim(),
            width
        )));
    }
    Ok(())
}
