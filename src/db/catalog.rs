use sqlx::PgPool;

use crate::{
    error::AppResult,
    models::{Course, CourseId},
};

/// Read access to the course catalog
///
/// The catalog is owned by the persistence layer; recommendation code only reads
/// from it, and treats it as the source of truth when hydrating ranked ids.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CourseCatalog: Send + Sync {
    async fn get_course_by_id(&self, course_id: CourseId) -> AppResult<Option<Course>>;

    /// Fetches the given courses in no particular order; unknown ids are skipped
    async fn get_courses_by_ids(&self, course_ids: &[CourseId]) -> AppResult<Vec<Course>>;

    async fn list_courses(&self) -> AppResult<Vec<Course>>;

    /// Up to `n` randomly chosen courses of one subject
    async fn random_courses_by_subject(&self, subject: &str, n: i64) -> AppResult<Vec<Course>>;
}

const COURSE_COLUMNS: &str = "id, course_id, course_title, url, is_paid, price, num_subscribers, \
     num_reviews, num_lectures, level, content_duration, published_timestamp, subject";

/// Catalog backed by the PostgreSQL `courses` table
#[derive(Clone)]
pub struct PgCourseCatalog {
    pool: PgPool,
}

impl PgCourseCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CourseCatalog for PgCourseCatalog {
    async fn get_course_by_id(&self, course_id: CourseId) -> AppResult<Option<Course>> {
        let sql = format!("SELECT {} FROM courses WHERE course_id = $1", COURSE_COLUMNS);
        let course = sqlx::query_as::<_, Course>(&sql)
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(course)
    }

    async fn get_courses_by_ids(&self, course_ids: &[CourseId]) -> AppResult<Vec<Course>> {
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT {} FROM courses WHERE course_id = ANY($1)", COURSE_COLUMNS);
        let courses = sqlx::query_as::<_, Course>(&sql)
            .bind(course_ids)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(
            requested = course_ids.len(),
            found = courses.len(),
            "Fetched courses by id"
        );

        Ok(courses)
    }

    async fn list_courses(&self) -> AppResult<Vec<Course>> {
        let sql = format!("SELECT {} FROM courses ORDER BY course_id", COURSE_COLUMNS);
        let courses = sqlx::query_as::<_, Course>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(courses)
    }

    async fn random_courses_by_subject(&self, subject: &str, n: i64) -> AppResult<Vec<Course>> {
        let sql = format!(
            "SELECT {} FROM courses WHERE subject = $1 ORDER BY RANDOM() LIMIT $2",
            COURSE_COLUMNS
        );
        let courses = sqlx::query_as::<_, Course>(&sql)
            .bind(subject)
            .bind(n)
            .fetch_all(&self.pool)
            .await?;
        Ok(courses)
    }
}
