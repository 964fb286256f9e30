//! Small hand-weighted model generation for unit tests.
//!
//! Content embeddings are driven by subject alone: every subject owns one axis of
//! a 4-d space, so courses sharing a subject tie and fall back to course-id order.

use chrono::{TimeZone, Utc};
use ndarray::{Array1, Array2};

use super::{
    artifacts::Manifest,
    features::FeatureEncoder,
    generation::{CollaborativeModel, ContentModel, ModelGeneration},
    index::BruteForceIndex,
    layers::{Activation, Dense, EmbeddingTable},
    text::TitleVectorizer,
    tower::{ContentTower, ContentTowerLayers, IdTower},
    vocab::{NumericScaler, ScaledFeature, ScalerParams, Vocabulary, NUMERIC_FEATURES},
};
use crate::models::{course::fixtures::course, Course};

pub const CONTENT_DIM: usize = 4;

fn vocab(tokens: &[&str]) -> Vocabulary {
    Vocabulary::new(tokens.iter().map(|t| t.to_string()).collect()).unwrap()
}

/// Catalog rows known to the fixture model
pub fn catalog_courses() -> Vec<Course> {
    vec![
        course(1, "Learn Excel", "Business Finance", "All Levels"),
        course(2, "Guitar for Beginners", "Musical Instruments", "Beginner Level"),
        course(3, "Excel Financial Modeling", "Business Finance", "Expert Level"),
        course(4, "Learn Web Development", "Web Development", "All Levels"),
        course(5, "Logo Design Essentials", "Graphic Design", "Intermediate Level"),
        course(6, "Stock Trading Basics", "Business Finance", "Beginner Level"),
    ]
}

/// `count` courses with ids `1..=count`, cycling through the fixture subjects
pub fn large_catalog(count: usize) -> Vec<Course> {
    const SUBJECTS: [&str; 4] = [
        "Business Finance",
        "Graphic Design",
        "Web Development",
        "Musical Instruments",
    ];
    (1..=count)
        .map(|id| {
            let subject = SUBJECTS[(id - 1) % SUBJECTS.len()];
            course(id as i64, &format!("Course {}", id), subject, "All Levels")
        })
        .collect()
}

pub fn encoder() -> FeatureEncoder {
    let title = TitleVectorizer::new(
        vocab(&["learn", "excel", "guitar", "web", "design"]),
        vec![1.0, 2.0, 2.0, 1.5, 1.5],
        0.5,
    )
    .unwrap();

    let spreads = [100.0, 1000.0, 100.0, 10.0, 1.0];
    let scaler = NumericScaler::from_features(
        NUMERIC_FEATURES
            .iter()
            .zip(spreads)
            .map(|(name, scale)| ScaledFeature {
                name: name.to_string(),
                params: ScalerParams::Standard { mean: 0.0, scale },
            })
            .collect(),
    )
    .unwrap();

    FeatureEncoder::new(
        vocab(&["1", "2", "3", "4", "5", "6"]),
        vocab(&[
            "Business Finance",
            "Graphic Design",
            "Web Development",
            "Musical Instruments",
        ]),
        vocab(&["All Levels", "Beginner Level", "Intermediate Level", "Expert Level"]),
        title,
        scaler,
    )
}

fn zero_dense(inputs: usize, outputs: usize, activation: Activation) -> Dense {
    Dense::new(Array2::zeros((inputs, outputs)), Array1::zeros(outputs), activation).unwrap()
}

pub fn content_layers(encoder: &FeatureEncoder) -> ContentTowerLayers {
    let subjects = encoder.subjects().size();

    // OOV subject sits between every axis
    let mut subject = Array2::<f32>::zeros((subjects, CONTENT_DIM));
    subject.row_mut(0).fill(0.25);
    for i in 0..CONTENT_DIM {
        subject[[i + 1, i]] = 1.0;
    }

    // course_id(2) | subject(4) | level(2) | title(2) | numeric(2)
    let fused = 2 + CONTENT_DIM + 2 + 2 + 2;
    let mut hidden = Array2::<f32>::zeros((fused, CONTENT_DIM));
    for i in 0..CONTENT_DIM {
        hidden[[2 + i, i]] = 1.0;
    }

    ContentTowerLayers {
        course_id: EmbeddingTable::new(Array2::zeros((encoder.course_ids().size(), 2))),
        subject: EmbeddingTable::new(subject),
        level: EmbeddingTable::new(Array2::zeros((encoder.levels().size(), 2))),
        title_projection: zero_dense(encoder.title().width(), 2, Activation::Linear),
        numeric_projection: zero_dense(NUMERIC_FEATURES.len(), 2, Activation::Linear),
        hidden: Dense::new(hidden, Array1::zeros(CONTENT_DIM), Activation::Relu).unwrap(),
        output: Dense::new(
            Array2::eye(CONTENT_DIM),
            Array1::from_elem(CONTENT_DIM, 0.01),
            Activation::Linear,
        )
        .unwrap(),
    }
}

pub fn content_tower(encoder: &FeatureEncoder) -> ContentTower {
    ContentTower::new(content_layers(encoder), encoder, true).unwrap()
}

pub fn collaborative_model() -> CollaborativeModel {
    let user_tower = IdTower::new(
        vocab(&["u1", "u2"]),
        EmbeddingTable::new(ndarray::array![[0.1, 0.1], [1.0, 0.0], [0.0, 1.0]]),
    )
    .unwrap();
    let course_tower = IdTower::new(
        vocab(&["1", "2", "3", "4"]),
        EmbeddingTable::new(ndarray::array![
            [0.0, 0.0],
            [0.9, 0.1],
            [0.8, 0.3],
            [0.1, 0.9],
            [0.2, 0.7]
        ]),
    )
    .unwrap();

    let index = CollaborativeModel::index_course_tower(&course_tower).unwrap();
    CollaborativeModel::new(user_tower, Box::new(index)).unwrap()
}

pub fn manifest() -> Manifest {
    Manifest {
        schema_version: super::artifacts::SCHEMA_VERSION,
        generation: "test-generation".to_string(),
        exported_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        normalize_output: true,
    }
}

pub fn generation() -> ModelGeneration {
    generation_over(&catalog_courses())
}

/// Fixture generation whose content index holds exactly `courses`
pub fn generation_over(courses: &[Course]) -> ModelGeneration {
    let encoder = encoder();
    let tower = content_tower(&encoder);
    let index = BruteForceIndex::from_snapshot(courses, &encoder, &tower).unwrap();
    let content = ContentModel::new(encoder, tower, Box::new(index)).unwrap();

    ModelGeneration::new(manifest(), content, collaborative_model())
}
