use ndarray::Array1;

use super::{
    text::TitleVectorizer,
    vocab::{NumericScaler, Vocabulary, NUMERIC_FEATURES},
};
use crate::models::Course;

/// Encoded inputs for the content tower
#[derive(Debug, Clone, PartialEq)]
pub struct CourseFeatures {
    pub course_id: usize,
    pub subject: usize,
    pub level: usize,
    pub title: Array1<f32>,
    pub numeric: Array1<f32>,
}

/// Maps catalog rows onto the encodings the content tower was trained with
///
/// Unknown categorical values land in the OOV row; this degrades recommendation
/// quality silently, so encoders built from a different training run must never
/// be mixed with that run's weights.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    course_ids: Vocabulary,
    subjects: Vocabulary,
    levels: Vocabulary,
    title: TitleVectorizer,
    scaler: NumericScaler,
}

impl FeatureEncoder {
    pub fn new(
        course_ids: Vocabulary,
        subjects: Vocabulary,
        levels: Vocabulary,
        title: TitleVectorizer,
        scaler: NumericScaler,
    ) -> Self {
        Self {
            course_ids,
            subjects,
            levels,
            title,
            scaler,
        }
    }

    pub fn encode(&self, course: &Course) -> CourseFeatures {
        CourseFeatures {
            course_id: self.course_ids.lookup(&course.course_id.to_string()),
            subject: self.subjects.lookup(&course.subject),
            level: self.levels.lookup(&course.level),
            title: self.title.transform(&course.course_title),
            numeric: self.scaler.transform(&numeric_inputs(course)),
        }
    }

    pub fn course_ids(&self) -> &Vocabulary {
        &self.course_ids
    }

    pub fn subjects(&self) -> &Vocabulary {
        &self.subjects
    }

    pub fn levels(&self) -> &Vocabulary {
        &self.levels
    }

    pub fn title(&self) -> &TitleVectorizer {
        &self.title
    }

    pub fn scaler(&self) -> &NumericScaler {
        &self.scaler
    }
}

/// Raw numeric features in [`NUMERIC_FEATURES`] order
pub fn numeric_inputs(course: &Course) -> [f64; NUMERIC_FEATURES.len()] {
    [
        f64::from(course.price),
        f64::from(course.num_subscribers),
        f64::from(course.num_reviews),
        f64::from(course.num_lectures),
        course.content_duration,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::course::fixtures::course;
    use crate::recommender::fixtures;
    use crate::recommender::OOV_INDEX;

    #[test]
    fn test_encode_known_course() {
        let encoder = fixtures::encoder();
        let features = encoder.encode(&course(1, "Learn Excel", "Business Finance", "All Levels"));

        assert_eq!(features.course_id, 1);
        assert_eq!(features.subject, 1);
        assert_eq!(features.level, 1);
        assert_eq!(features.title.len(), encoder.title().width());
        assert_eq!(features.numeric.len(), NUMERIC_FEATURES.len());
    }

    #[test]
    fn test_encode_unseen_values_use_oov() {
        let encoder = fixtures::encoder();
        let features = encoder.encode(&course(
            987654321,
            "Underwater Basket Weaving",
            "Cooking",
            "Grandmaster Level",
        ));

        assert_eq!(features.course_id, OOV_INDEX);
        assert_eq!(features.subject, OOV_INDEX);
        assert_eq!(features.level, OOV_INDEX);
    }

    #[test]
    fn test_numeric_inputs_order() {
        let mut c = course(1, "Learn Excel", "Business Finance", "All Levels");
        c.price = 20;
        c.num_subscribers = 300;
        c.num_reviews = 10;
        c.num_lectures = 12;
        c.content_duration = 1.5;
        assert_eq!(numeric_inputs(&c), [20.0, 300.0, 10.0, 12.0, 1.5]);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let encoder = fixtures::encoder();
        let c = course(3, "Web Development Bootcamp", "Web Development", "Beginner Level");
        assert_eq!(encoder.encode(&c), encoder.encode(&c));
    }
}
