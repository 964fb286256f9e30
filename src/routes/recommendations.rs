use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;

use super::{query_param, AppState};
use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{ApiResponse, Course, CourseId},
    services::MAX_RECOMMENDATIONS,
};

const DEFAULT_COURSE_ID: CourseId = 1;
const DEFAULT_COUNT: i64 = 5;

#[derive(Debug, Deserialize)]
pub struct SimilarCoursesQuery {
    course_id: Option<String>,
    n: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserCoursesQuery {
    user_id: Option<String>,
    n: Option<String>,
}

/// Rejects non-positive counts and clamps large ones to the service maximum
fn clamp_count(raw: Option<&str>) -> AppResult<i64> {
    let n = query_param("n", raw, DEFAULT_COUNT)?;
    if n <= 0 {
        return Err(AppError::InvalidInput(
            "Parameter n must be a positive integer".to_string(),
        ));
    }
    Ok(n.min(MAX_RECOMMENDATIONS))
}

/// Handler for content-based recommendations
pub async fn similar_courses(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<SimilarCoursesQuery>,
) -> AppResult<Json<ApiResponse<Vec<Course>>>> {
    let course_id = query_param("course_id", params.course_id.as_deref(), DEFAULT_COURSE_ID)?;
    let n = clamp_count(params.n.as_deref())?;

    tracing::info!(
        request_id = %request_id,
        course_id = course_id,
        n = n,
        "Processing content-based recommendation request"
    );

    let courses = state.recommender.recommend_similar(course_id, n).await?;

    Ok(Json(ApiResponse::success(
        format!(
            "Successfully fetched {} recommended courses for course ID {}",
            courses.len(),
            course_id
        ),
        courses,
    )))
}

/// Handler for collaborative recommendations
pub async fn user_courses(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<UserCoursesQuery>,
) -> AppResult<Json<ApiResponse<Vec<Course>>>> {
    let user_id = params
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Parameter user_id is required".to_string()))?;
    let n = clamp_count(params.n.as_deref())?;

    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        n = n,
        "Processing collaborative recommendation request"
    );

    let courses = state.recommender.recommend_for_user(user_id, n).await?;

    Ok(Json(ApiResponse::success(
        format!(
            "Successfully fetched {} recommended courses for user {}",
            courses.len(),
            user_id
        ),
        courses,
    )))
}
