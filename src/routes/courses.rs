use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{query_param, AppState};
use crate::{
    error::{AppError, AppResult},
    models::{ApiResponse, Course, CourseId, FEATURED_SUBJECTS},
    services::MAX_RECOMMENDATIONS,
};

const DEFAULT_RANDOM_PER_SUBJECT: i64 = 2;

#[derive(Debug, Deserialize)]
pub struct RandomCoursesQuery {
    n: Option<String>,
}

/// Handler listing the whole catalog
pub async fn list_courses(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<Course>>>> {
    let courses = state.catalog.list_courses().await?;
    tracing::debug!(count = courses.len(), "Listed courses");
    Ok(Json(ApiResponse::success(
        "Successfully fetched all courses",
        courses,
    )))
}

/// Handler for a single course by its catalog id
pub async fn get_course(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<CourseId>,
) -> AppResult<Json<ApiResponse<Course>>> {
    let course = state
        .catalog
        .get_course_by_id(course_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Course with ID {} not found", course_id)))?;

    Ok(Json(ApiResponse::success(
        format!("Successfully fetched course with ID {}", course_id),
        course,
    )))
}

/// Handler sampling `n` random courses from each featured subject
pub async fn random_courses(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RandomCoursesQuery>,
) -> AppResult<Json<ApiResponse<Vec<Course>>>> {
    let n = query_param("n", params.n.as_deref(), DEFAULT_RANDOM_PER_SUBJECT)?;
    if n <= 0 {
        return Err(AppError::InvalidInput(
            "Parameter n must be a positive integer".to_string(),
        ));
    }
    let n = n.min(MAX_RECOMMENDATIONS);

    let mut courses = Vec::new();
    for subject in FEATURED_SUBJECTS {
        courses.extend(state.catalog.random_courses_by_subject(subject, n).await?);
    }

    Ok(Json(ApiResponse::success(
        format!("Successfully fetched {} random courses of each subject", n),
        courses,
    )))
}
