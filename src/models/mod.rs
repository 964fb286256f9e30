pub mod course;
pub mod response;

pub use course::{Course, CourseId, FEATURED_SUBJECTS};
pub use response::{ApiResponse, ModelSummary};
