use std::collections::BTreeMap;
use std::sync::Arc;

use super::catalog::CourseCatalog;
use crate::{
    error::AppResult,
    models::{Course, CourseId},
};

/// Immutable catalog held in memory
///
/// The service itself always runs against [`PgCourseCatalog`](super::PgCourseCatalog);
/// this is the catalog double for unit and integration tests that need real
/// catalog behaviour without a database. Its "random" sample is deterministic:
/// the lowest course ids of the subject.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    courses: Arc<BTreeMap<CourseId, Course>>,
}

impl InMemoryCatalog {
    pub fn new(courses: impl IntoIterator<Item = Course>) -> Self {
        let courses = courses
            .into_iter()
            .map(|course| (course.course_id, course))
            .collect();
        Self {
            courses: Arc::new(courses),
        }
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

#[async_trait::async_trait]
impl CourseCatalog for InMemoryCatalog {
    async fn get_course_by_id(&self, course_id: CourseId) -> AppResult<Option<Course>> {
        Ok(self.courses.get(&course_id).cloned())
    }

    async fn get_courses_by_ids(&self, course_ids: &[CourseId]) -> AppResult<Vec<Course>> {
        Ok(course_ids
            .iter()
            .filter_map(|id| self.courses.get(id))
            .cloned()
            .collect())
    }

    async fn list_courses(&self) -> AppResult<Vec<Course>> {
        Ok(self.courses.values().cloned().collect())
    }

    async fn random_courses_by_subject(&self, subject: &str, n: i64) -> AppResult<Vec<Course>> {
        let limit = usize::try_from(n).unwrap_or(0);
        Ok(self
            .courses
            .values()
            .filter(|course| course.subject == subject)
            .take(limit)
            .cloned()
            .collect())
    }
}
