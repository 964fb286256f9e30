use serde::Serialize;

/// JSON envelope returned by every course endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success",
            message: message.into(),
            data,
        }
    }
}

/// Summary of the model generation currently being served
#[derive(Debug, Serialize)]
pub struct ModelSummary {
    pub generation: String,
    pub exported_at: chrono::DateTime<chrono::Utc>,
    pub content_index_size: usize,
    pub collaborative_index_size: usize,
    pub content_dimension: usize,
    pub collaborative_dimension: usize,
}
