use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::{
    cached,
    db::{Cache, CacheKey, CourseCatalog},
    error::{AppError, AppResult},
    models::{Course, CourseId, ModelSummary},
    recommender::ModelHandle,
};

/// Largest `n` a single recommendation call accepts
pub const MAX_RECOMMENDATIONS: i64 = 1000;

#[derive(Clone)]
struct RankingCache {
    cache: Cache,
    ttl: u64,
}

/// Content-based and collaborative course recommendations
///
/// Rankings come from the served model generation; course records always come from
/// the catalog. Ranked ids the catalog no longer knows are dropped, never replaced.
#[derive(Clone)]
pub struct RecommendationService {
    model: ModelHandle,
    catalog: Arc<dyn CourseCatalog>,
    cache: Option<RankingCache>,
    exclude_query_course: bool,
}

impl RecommendationService {
    pub fn new(model: ModelHandle, catalog: Arc<dyn CourseCatalog>) -> Self {
        Self {
            model,
            catalog,
            cache: None,
            exclude_query_course: false,
        }
    }

    /// Caches ranked course-id lists in Redis for `ttl` seconds
    pub fn with_cache(mut self, cache: Cache, ttl: u64) -> Self {
        self.cache = Some(RankingCache { cache, ttl });
        self
    }

    /// Drops the query course from its own content-based results
    pub fn exclude_query_course(mut self, exclude: bool) -> Self {
        self.exclude_query_course = exclude;
        self
    }

    /// Courses most similar to `course_id`, best first
    ///
    /// The query course is usually its own top neighbour and is kept unless the
    /// service was built with `exclude_query_course(true)`.
    pub async fn recommend_similar(&self, course_id: CourseId, n: i64) -> AppResult<Vec<Course>> {
        if course_id <= 0 {
            return Err(AppError::InvalidInput(
                "course_id must be a positive integer".to_string(),
            ));
        }
        let n = validate_count(n)?;

        let course = self
            .catalog
            .get_course_by_id(course_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Course with ID {} not found", course_id)))?;

        let generation = self.model.get().await?;
        let exclude = self.exclude_query_course;
        let key = CacheKey::SimilarCourses {
            generation: generation.name().to_string(),
            course_id,
            n,
            exclude_query_course: exclude,
        };

        let ranked = self
            .ranked(key, async {
                let content = generation.content();
                let neighbors = if exclude {
                    content.similar_excluding_self(&course, n)?
                } else {
                    content.similar(&course, n)?
                };
                let ids: Vec<CourseId> = neighbors
                    .into_iter()
                    .map(|neighbor| neighbor.course_id)
                    .collect();
                Ok::<_, AppError>(ids)
            })
            .await?;

        let courses = self.hydrate(&ranked).await?;
        tracing::info!(
            course_id = course_id,
            requested = n,
            returned = courses.len(),
            "Content-based recommendations ready"
        );

        Ok(courses)
    }

    /// Courses ranked for `user_id`, best first
    ///
    /// Users the model never saw share the out-of-vocabulary embedding and still
    /// receive a ranked list.
    pub async fn recommend_for_user(&self, user_id: &str, n: i64) -> AppResult<Vec<Course>> {
        let n = validate_count(n)?;

        let generation = self.model.get().await?;
        let collaborative = generation.collaborative();
        if !collaborative.is_known_user(user_id) {
            tracing::debug!(user_id = %user_id, "Unknown user, ranking from the OOV embedding");
        }

        let key = CacheKey::UserRecommendations {
            generation: generation.name().to_string(),
            user_id: user_id.to_string(),
            n,
        };

        let ranked = self
            .ranked(key, async {
                let ids: Vec<CourseId> = collaborative
                    .for_user(user_id, n)?
                    .into_iter()
                    .map(|neighbor| neighbor.course_id)
                    .collect();
                Ok::<_, AppError>(ids)
            })
            .await?;

        let courses = self.hydrate(&ranked).await?;
        tracing::info!(
            user_id = %user_id,
            requested = n,
            returned = courses.len(),
            "Collaborative recommendations ready"
        );

        Ok(courses)
    }

    pub async fn model_summary(&self) -> AppResult<ModelSummary> {
        let generation = self.model.get().await?;
        let manifest = generation.manifest();

        Ok(ModelSummary {
            generation: manifest.generation.clone(),
            exported_at: manifest.exported_at,
            content_index_size: generation.content().index().len(),
            collaborative_index_size: generation.collaborative().index().len(),
            content_dimension: generation.content().dimension(),
            collaborative_dimension: generation.collaborative().dimension(),
        })
    }

    async fn ranked<F>(&self, key: CacheKey, rank: F) -> AppResult<Vec<CourseId>>
    where
        F: Future<Output = AppResult<Vec<CourseId>>>,
    {
        match &self.cache {
            Some(RankingCache { cache, ttl }) => cached!(cache, key, *ttl, rank),
            None => rank.await,
        }
    }

    /// Fetches catalog records for `ranked`, preserving rank order
    async fn hydrate(&self, ranked: &[CourseId]) -> AppResult<Vec<Course>> {
        let mut found: HashMap<CourseId, Course> = self
            .catalog
            .get_courses_by_ids(ranked)
            .await?
            .into_iter()
            .map(|course| (course.course_id, course))
            .collect();

        let mut courses = Vec::with_capacity(ranked.len());
        let mut missing = 0usize;
        for course_id in ranked {
            match found.remove(course_id) {
                Some(course) => courses.push(course),
                None => {
                    missing += 1;
                    tracing::debug!(course_id = course_id, "Ranked course missing from catalog");
                }
            }
        }

        if missing > 0 {
            tracing::warn!(
                ranked = ranked.len(),
                missing = missing,
                "Catalog is missing ranked courses; the model generation may be stale"
            );
        }

        Ok(courses)
    }
}

fn validate_count(n: i64) -> AppResult<usize> {
    if !(1..=MAX_RECOMMENDATIONS).contains(&n) {
        return Err(AppError::InvalidInput(format!(
            "n must be between 1 and {}, got {}",
            MAX_RECOMMENDATIONS, n
        )));
    }
    usize::try_from(n).map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryCatalog, MockCourseCatalog};
    use crate::recommender::{fixtures, ModelError, ModelGeneration, ModelLoader};
    use std::collections::HashSet;

    struct FixtureLoader;

    #[async_trait::async_trait]
    impl ModelLoader for FixtureLoader {
        async fn load(&self) -> Result<ModelGeneration, ModelError> {
            Ok(fixtures::generation())
        }
    }

    fn model() -> ModelHandle {
        ModelHandle::new(Arc::new(FixtureLoader))
    }

    fn service() -> RecommendationService {
        let catalog = InMemoryCatalog::new(fixtures::catalog_courses());
        RecommendationService::new(model(), Arc::new(catalog))
    }

    fn ids(courses: &[Course]) -> Vec<CourseId> {
        courses.iter().map(|c| c.course_id).collect()
    }

    #[tokio::test]
    async fn test_recommend_similar_ranks_same_subject_first() {
        let courses = service().recommend_similar(1, 3).await.unwrap();

        assert_eq!(ids(&courses), vec![1, 3, 6]);
        assert!(courses.iter().all(|c| c.subject == "Business Finance"));
    }

    #[tokio::test]
    async fn test_recommend_similar_is_deterministic() {
        let service = service();
        let first = service.recommend_similar(4, 5).await.unwrap();
        let second = service.recommend_similar(4, 5).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_recommend_similar_at_most_n_unique() {
        let courses = service().recommend_similar(2, 1000).await.unwrap();

        assert!(courses.len() <= 1000);
        assert_eq!(courses.len(), fixtures::catalog_courses().len());
        let unique: HashSet<CourseId> = ids(&courses).into_iter().collect();
        assert_eq!(unique.len(), courses.len());
    }

    #[tokio::test]
    async fn test_recommend_similar_excluding_query_course() {
        let courses = service()
            .exclude_query_course(true)
            .recommend_similar(1, 2)
            .await
            .unwrap();

        assert_eq!(ids(&courses), vec![3, 6]);
    }

    struct LargeCatalogLoader;

    #[async_trait::async_trait]
    impl ModelLoader for LargeCatalogLoader {
        async fn load(&self) -> Result<ModelGeneration, ModelError> {
            Ok(fixtures::generation_over(&fixtures::large_catalog(1200)))
        }
    }

    #[tokio::test]
    async fn test_recommend_similar_excluding_query_course_returns_full_n() {
        let catalog = InMemoryCatalog::new(fixtures::large_catalog(1200));
        let service = RecommendationService::new(
            ModelHandle::new(Arc::new(LargeCatalogLoader)),
            Arc::new(catalog),
        )
        .exclude_query_course(true);

        let courses = service.recommend_similar(1, 1000).await.unwrap();

        assert_eq!(courses.len(), 1000);
        assert!(!ids(&courses).contains(&1));
        let unique: HashSet<CourseId> = ids(&courses).into_iter().collect();
        assert_eq!(unique.len(), 1000);
    }

    #[tokio::test]
    async fn test_recommend_similar_unknown_course_is_not_found() {
        let err = service().recommend_similar(42, 5).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_recommend_similar_rejects_bad_arguments() {
        let service = service();
        for (course_id, n) in [(1, 0), (1, -3), (1, 1001), (0, 5), (-7, 5)] {
            let err = service.recommend_similar(course_id, n).await.unwrap_err();
            assert!(
                matches!(err, AppError::InvalidInput(_)),
                "course_id={} n={} should be rejected",
                course_id,
                n
            );
        }
    }

    #[tokio::test]
    async fn test_recommend_similar_skips_unhydrated_courses() {
        let mut catalog = MockCourseCatalog::new();
        catalog
            .expect_get_course_by_id()
            .returning(|id| Ok(fixtures::catalog_courses().into_iter().find(|c| c.course_id == id)));
        // Course 3 was removed from the catalog after the generation was exported
        catalog.expect_get_courses_by_ids().returning(|requested| {
            Ok(fixtures::catalog_courses()
                .into_iter()
                .filter(|c| c.course_id != 3 && requested.contains(&c.course_id))
                .rev()
                .collect())
        });

        let service = RecommendationService::new(model(), Arc::new(catalog));
        let courses = service.recommend_similar(1, 3).await.unwrap();

        assert_eq!(ids(&courses), vec![1, 6]);
    }

    #[tokio::test]
    async fn test_recommend_similar_propagates_catalog_errors() {
        let mut catalog = MockCourseCatalog::new();
        catalog
            .expect_get_course_by_id()
            .returning(|_| Err(AppError::Internal("catalog unavailable".to_string())));

        let service = RecommendationService::new(model(), Arc::new(catalog));
        let err = service.recommend_similar(1, 5).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_recommend_for_known_user() {
        let courses = service().recommend_for_user("u1", 2).await.unwrap();
        assert_eq!(ids(&courses), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_recommend_for_unknown_user_returns_ranked_list() {
        let courses = service().recommend_for_user("never-seen", 3).await.unwrap();
        assert_eq!(courses.len(), 3);
    }

    #[tokio::test]
    async fn test_recommend_for_user_rejects_bad_n() {
        let service = service();
        assert!(matches!(
            service.recommend_for_user("u1", 0).await.unwrap_err(),
            AppError::InvalidInput(_)
        ));
        assert!(matches!(
            service.recommend_for_user("u1", 1001).await.unwrap_err(),
            AppError::InvalidInput(_)
        ));
        assert!(service.recommend_for_user("u1", 1000).await.is_ok());
    }

    #[tokio::test]
    async fn test_model_summary() {
        let summary = service().model_summary().await.unwrap();

        assert_eq!(summary.generation, "test-generation");
        assert_eq!(summary.content_index_size, fixtures::catalog_courses().len());
        assert_eq!(summary.collaborative_index_size, 4);
        assert_eq!(summary.content_dimension, fixtures::CONTENT_DIM);
        assert_eq!(summary.collaborative_dimension, 2);
    }
}
