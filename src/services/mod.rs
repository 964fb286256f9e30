pub mod recommendations;

pub use recommendations::{RecommendationService, MAX_RECOMMENDATIONS};
