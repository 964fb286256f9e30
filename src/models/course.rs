use serde::{Deserialize, Serialize};

/// Catalog-wide course identifier, the join key between the catalog and the
/// model vocabularies
pub type CourseId = i64;

/// A course row as stored in the `courses` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Course {
    /// Surrogate primary key of the catalog row
    pub id: i32,
    pub course_id: CourseId,
    pub course_title: String,
    pub url: String,
    pub is_paid: bool,
    pub price: i32,
    pub num_subscribers: i32,
    pub num_reviews: i32,
    pub num_lectures: i32,
    /// Difficulty level (e.g., "Beginner Level", "All Levels")
    pub level: String,
    /// Content length in hours
    pub content_duration: f64,
    pub published_timestamp: String,
    pub subject: String,
}

/// Subjects surfaced by the random course sampler, in display order
pub const FEATURED_SUBJECTS: [&str; 4] = [
    "Business Finance",
    "Graphic Design",
    "Web Development",
    "Musical Instruments",
];
