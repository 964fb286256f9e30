use std::cmp::Ordering;
use std::collections::HashSet;

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::{features::FeatureEncoder, tower::Tower, CourseFeatures, ModelError};
use crate::models::{Course, CourseId};

/// Upper bound on neighbours returned by a single query
pub const MAX_QUERY_K: usize = 1000;

/// A retrieved course and its inner-product score against the query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub course_id: CourseId,
    pub score: f32,
}

/// Nearest-neighbour search over course embeddings
///
/// Results are ordered by descending score, ties by ascending course id. An index
/// only knows the courses it was built from; courses added to the catalog later
/// are unreachable until the next model generation.
pub trait RetrievalIndex: Send + Sync {
    /// Returns at most `min(k, MAX_QUERY_K, len())` neighbours
    fn query(&self, query: ArrayView1<'_, f32>, k: usize) -> Result<Vec<Neighbor>, ModelError> {
        self.query_excluding(query, k, None)
    }

    /// Like [`query`](RetrievalIndex::query), but `exclude` is removed before the
    /// top `k` are selected, so it never costs a slot
    fn query_excluding(
        &self,
        query: ArrayView1<'_, f32>,
        k: usize,
        exclude: Option<CourseId>,
    ) -> Result<Vec<Neighbor>, ModelError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dimension(&self) -> usize;
}

/// Exact search scoring every indexed embedding
#[derive(Debug, Clone)]
pub struct BruteForceIndex {
    course_ids: Vec<CourseId>,
    embeddings: Array2<f32>,
}

impl BruteForceIndex {
    pub fn build(
        entries: Vec<(CourseId, Array1<f32>)>,
        dimension: usize,
    ) -> Result<Self, ModelError> {
        if entries.is_empty() {
            return Err(ModelError::Schema("retrieval index has no entries".to_string()));
        }

        let mut seen = HashSet::with_capacity(entries.len());
        let mut course_ids = Vec::with_capacity(entries.len());
        let mut data = Vec::with_capacity(entries.len() * dimension);

        for (course_id, embedding) in entries {
            if embedding.len() != dimension {
                return Err(ModelError::Schema(format!(
                    "embedding for course {} has width {}, index width is {}",
                    course_id,
                    embedding.len(),
                    dimension
                )));
            }
            if !seen.insert(course_id) {
                return Err(ModelError::Schema(format!(
                    "course {} appears twice in the retrieval index",
                    course_id
                )));
            }
            course_ids.push(course_id);
            data.extend(embedding.iter().copied());
        }

        let embeddings = Array2::from_shape_vec((course_ids.len(), dimension), data)
            .map_err(|e| ModelError::Schema(format!("invalid index matrix: {}", e)))?;

        Ok(Self {
            course_ids,
            embeddings,
        })
    }

    /// Builds an index by embedding a catalog snapshot through a content tower
    pub fn from_snapshot<T>(
        courses: &[Course],
        encoder: &FeatureEncoder,
        tower: &T,
    ) -> Result<Self, ModelError>
    where
        T: Tower<Input = CourseFeatures>,
    {
        let entries = courses
            .iter()
            .map(|course| -> Result<(CourseId, Array1<f32>), ModelError> {
                Ok((course.course_id, tower.embed(&encoder.encode(course))?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::build(entries, tower.dimension())
    }

    pub fn course_ids(&self) -> &[CourseId] {
        &self.course_ids
    }
}

impl RetrievalIndex for BruteForceIndex {
    fn query_excluding(
        &self,
        query: ArrayView1<'_, f32>,
        k: usize,
        exclude: Option<CourseId>,
    ) -> Result<Vec<Neighbor>, ModelError> {
        if query.len() != self.dimension() {
            return Err(ModelError::DimensionMismatch {
                expected: self.dimension(),
                got: query.len(),
            });
        }

        let mut positions: Vec<usize> = (0..self.len())
            .filter(|&i| Some(self.course_ids[i]) != exclude)
            .collect();

        let k = k.min(MAX_QUERY_K).min(positions.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let scores = self.embeddings.dot(&query);
        let rank = |a: &usize, b: &usize| -> Ordering {
            scores[*b]
                .total_cmp(&scores[*a])
                .then_with(|| self.course_ids[*a].cmp(&self.course_ids[*b]))
        };

        if k < positions.len() {
            positions.select_nth_unstable_by(k - 1, rank);
            positions.truncate(k);
        }
        positions.sort_unstable_by(rank);

        Ok(positions
            .into_iter()
            .map(|i| Neighbor {
                course_id: self.course_ids[i],
                score: scores[i],
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.course_ids.len()
    }

    fn dimension(&self) -> usize {
        self.embeddings.ncols()
    }
}
