use std::collections::HashMap;

use ndarray::Array1;
use serde::Deserialize;

use super::ModelError;

/// Row reserved for tokens that were not seen at training time
pub const OOV_INDEX: usize = 0;

/// Numeric course features in the order the towers were trained on
pub const NUMERIC_FEATURES: [&str; 5] = [
    "price",
    "num_subscribers",
    "num_reviews",
    "num_lectures",
    "content_duration",
];

/// Ordered token vocabulary fixed at training time
///
/// Known tokens occupy indices `1..=len()` in artifact order; everything else maps
/// to [`OOV_INDEX`]. Embedding tables built against a vocabulary therefore have
/// `size()` rows.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct Vocabulary {
    tokens: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn new(tokens: Vec<String>) -> Result<Self, ModelError> {
        let mut lookup = HashMap::with_capacity(tokens.len());
        for (position, token) in tokens.iter().enumerate() {
            if lookup.insert(token.clone(), position + 1).is_some() {
                return Err(ModelError::Schema(format!(
                    "duplicate vocabulary token '{}'",
                    token
                )));
            }
        }
        Ok(Self { tokens, lookup })
    }

    /// Maps a token to its row, falling back to the OOV row
    pub fn lookup(&self, token: &str) -> usize {
        self.lookup.get(token).copied().unwrap_or(OOV_INDEX)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.lookup.contains_key(token)
    }

    /// Number of known tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of rows including the OOV row
    pub fn size(&self) -> usize {
        self.tokens.len() + 1
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}

impl TryFrom<Vec<String>> for Vocabulary {
    type Error = ModelError;

    fn try_from(tokens: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(tokens)
    }
}

/// Scaling constants for one numeric feature
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerParams {
    /// `(x - mean) / scale`
    Standard { mean: f64, scale: f64 },
    /// `(x - min) / (max - min)`
    MinMax { min: f64, max: f64 },
}

impl ScalerParams {
    pub fn apply(&self, value: f64) -> f64 {
        match *self {
            ScalerParams::Standard { mean, scale } => (value - mean) / non_zero(scale),
            ScalerParams::MinMax { min, max } => (value - min) / non_zero(max - min),
        }
    }
}

// Constant features were fitted with a zero spread; the fitted scaler divides by 1.
fn non_zero(spread: f64) -> f64 {
    if spread == 0.0 {
        1.0
    } else {
        spread
    }
}

/// A named scaler entry as stored in `content/scaler.json`
#[derive(Debug, Clone, Deserialize)]
pub struct ScaledFeature {
    pub name: String,
    #[serde(flatten)]
    pub params: ScalerParams,
}

/// Numeric feature scaler fitted at training time
#[derive(Debug, Clone)]
pub struct NumericScaler {
    params: [ScalerParams; NUMERIC_FEATURES.len()],
}

impl NumericScaler {
    /// Validates that the stored features match [`NUMERIC_FEATURES`] exactly and in order
    pub fn from_features(features: Vec<ScaledFeature>) -> Result<Self, ModelError> {
        if features.len() != NUMERIC_FEATURES.len() {
            return Err(ModelError::Schema(format!(
                "scaler has {} features, expected {}",
                features.len(),
                NUMERIC_FEATURES.len()
            )));
        }

        let mut params = [ScalerParams::Standard {
            mean: 0.0,
            scale: 1.0,
        }; NUMERIC_FEATURES.len()];

        for (slot, (feature, expected)) in features.iter().zip(NUMERIC_FEATURES).enumerate() {
            if feature.name != expected {
                return Err(ModelError::Schema(format!(
                    "scaler feature {} is '{}', expected '{}'",
                    slot, feature.name, expected
                )));
            }
            params[slot] = feature.params;
        }

        Ok(Self { params })
    }

    /// Number of scaled features
    pub fn width(&self) -> usize {
        self.params.len()
    }

    pub fn transform(&self, raw: &[f64; NUMERIC_FEATURES.len()]) -> Array1<f32> {
        self.params
            .iter()
            .zip(raw)
            .map(|(params, value)| params.apply(*value) as f32)
            .collect()
    }
}
