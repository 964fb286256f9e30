use ndarray::Array1;

use super::{vocab::Vocabulary, ModelError, OOV_INDEX};

/// Turns a course title into a TF-IDF weighted bag of tokens
///
/// Output width is `vocabulary.size()`. Each known token contributes
/// `count * idf` at its vocabulary row; unknown tokens accumulate in the OOV row
/// with the OOV weight.
#[derive(Debug, Clone)]
pub struct TitleVectorizer {
    vocabulary: Vocabulary,
    idf: Array1<f32>,
}

impl TitleVectorizer {
    pub fn new(vocabulary: Vocabulary, idf: Vec<f32>, oov_idf: f32) -> Result<Self, ModelError> {
        if idf.len() != vocabulary.len() {
            return Err(ModelError::Schema(format!(
                "title vocabulary has {} tokens but {} idf weights",
                vocabulary.len(),
                idf.len()
            )));
        }

        let weights: Array1<f32> = std::iter::once(oov_idf).chain(idf).collect();

        Ok(Self {
            vocabulary,
            idf: weights,
        })
    }

    pub fn width(&self) -> usize {
        self.vocabulary.size()
    }

    pub fn transform(&self, title: &str) -> Array1<f32> {
        let mut counts = Array1::<f32>::zeros(self.width());
        for token in standardize(title) {
            counts[self.vocabulary.lookup(&token)] += 1.0;
        }
        counts * &self.idf
    }

    /// Fraction of title tokens that fell into the OOV row
    pub fn oov_ratio(&self, title: &str) -> f32 {
        let tokens = standardize(title);
        if tokens.is_empty() {
            return 0.0;
        }
        let unknown = tokens
            .iter()
            .filter(|t| self.vocabulary.lookup(t) == OOV_INDEX)
            .count();
        unknown as f32 / tokens.len() as f32
    }
}

/// Lowercases, strips ASCII punctuation and splits on whitespace
pub fn standardize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
