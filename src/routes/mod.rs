use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    db::CourseCatalog,
    error::{AppError, AppResult},
    middleware::{make_span_with_request_id, request_id_middleware},
    models::{ApiResponse, ModelSummary},
    services::RecommendationService,
};

pub mod courses;
pub mod recommendations;

/// Shared handler state
pub struct AppState {
    pub catalog: Arc<dyn CourseCatalog>,
    pub recommender: RecommendationService,
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
}

/// API routes under /api
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/courses", get(courses::list_courses))
        .route("/courses/random", get(courses::random_courses))
        .route("/courses/recommender1", get(recommendations::similar_courses))
        .route("/courses/recommender2", get(recommendations::user_courses))
        .route("/courses/:course_id", get(courses::get_course))
        .route("/model", get(model_summary))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Summary of the model generation being served
async fn model_summary(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<ModelSummary>>> {
    let summary = state.recommender.model_summary().await?;
    let message = format!("Serving model generation {}", summary.generation);
    Ok(Json(ApiResponse::success(message, summary)))
}

/// Parses an optional query parameter, falling back to `default` when absent
pub(crate) fn query_param<T: FromStr>(name: &str, raw: Option<&str>, default: T) -> AppResult<T> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value.parse().map_err(|_| {
            AppError::InvalidInput(format!("Parameter {} must be an integer, got '{}'", name, value))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_default_when_absent() {
        assert_eq!(query_param("n", None, 5i64).unwrap(), 5);
        assert_eq!(query_param("n", Some(""), 5i64).unwrap(), 5);
    }

    #[test]
    fn test_query_param_parses_value() {
        assert_eq!(query_param("n", Some(" 12 "), 5i64).unwrap(), 12);
        assert_eq!(query_param("n", Some("-3"), 5i64).unwrap(), -3);
    }

    #[test]
    fn test_query_param_rejects_garbage() {
        let err = query_param("course_id", Some("abc"), 1i64).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
