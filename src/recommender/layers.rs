use ndarray::{Array1, Array2, ArrayView1};
use serde::Deserialize;

use super::ModelError;

/// Row-major matrix as stored in weight artifacts
#[derive(Debug, Clone, Deserialize)]
pub struct MatrixArtifact {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl MatrixArtifact {
    pub fn into_array(self, name: &str) -> Result<Array2<f32>, ModelError> {
        Array2::from_shape_vec((self.rows, self.cols), self.data).map_err(|e| {
            ModelError::Schema(format!(
                "{} is not a {}x{} matrix: {}",
                name, self.rows, self.cols, e
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
}

/// Dense layer weights as stored in weight artifacts
#[derive(Debug, Clone, Deserialize)]
pub struct DenseArtifact {
    /// `input_dim x output_dim`
    pub kernel: MatrixArtifact,
    pub bias: Vec<f32>,
    #[serde(default)]
    pub activation: Activation,
}

/// Lookup table mapping vocabulary rows to dense vectors
#[derive(Debug, Clone)]
pub struct EmbeddingTable {
    weights: Array2<f32>,
}

impl EmbeddingTable {
    pub fn new(weights: Array2<f32>) -> Self {
        Self { weights }
    }

    pub fn from_artifact(artifact: MatrixArtifact, name: &str) -> Result<Self, ModelError> {
        Ok(Self::new(artifact.into_array(name)?))
    }

    pub fn rows(&self) -> usize {
        self.weights.nrows()
    }

    pub fn dimension(&self) -> usize {
        self.weights.ncols()
    }

    pub fn lookup(&self, row: usize) -> Result<ArrayView1<'_, f32>, ModelError> {
        if row >= self.rows() {
            return Err(ModelError::Schema(format!(
                "embedding row {} out of range for table with {} rows",
                row,
                self.rows()
            )));
        }
        Ok(self.weights.row(row))
    }
}

/// Fully connected layer computing `activation(x . kernel + bias)`
#[derive(Debug, Clone)]
pub struct Dense {
    kernel: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

impl Dense {
    pub fn new(
        kernel: Array2<f32>,
        bias: Array1<f32>,
        activation: Activation,
    ) -> Result<Self, ModelError> {
        if bias.len() != kernel.ncols() {
            return Err(ModelError::Schema(format!(
                "dense bias has {} entries for {} outputs",
                bias.len(),
                kernel.ncols()
            )));
        }
        Ok(Self {
            kernel,
            bias,
            activation,
        })
    }

    pub fn from_artifact(artifact: DenseArtifact, name: &str) -> Result<Self, ModelError> {
        let kernel = artifact.kernel.into_array(name)?;
        Self::new(kernel, Array1::from(artifact.bias), artifact.activation)
    }

    pub fn input_dim(&self) -> usize {
        self.kernel.nrows()
    }

    pub fn output_dim(&self) -> usize {
        self.kernel.ncols()
    }

    pub fn forward(&self, input: ArrayView1<'_, f32>) -> Result<Array1<f32>, ModelError> {
        if input.len() != self.input_dim() {
            return Err(ModelError::DimensionMismatch {
                expected: self.input_dim(),
                got: input.len(),
            });
        }

        let mut output = input.dot(&self.kernel) + &self.bias;
        if self.activation == Activation::Relu {
            output.mapv_inplace(|x| x.max(0.0));
        }
        Ok(output)
    }
}

/// Scales `vector` to unit L2 norm; the zero vector is left unchanged
pub fn l2_normalize(vector: &mut Array1<f32>) {
    let norm = vector.dot(vector).sqrt();
    if norm > 0.0 {
        *vector /= norm;
    }
}
