//! Dense and dropout layers operating on `[batch, features]` tensors.
use rand::Rng;

use crate::activations::Activation;
use crate::error::{Error, Result};
use crate::tensor::Tensor;

/// Weight matrix, `[out_features][in_features]`.
pub type Matrix = Vec<Vec<f64>>;

/// A fully-connected layer with weights, bias, and an activation function.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    pub weights: Matrix,
    pub bias: Vec<f64>,
    pub activation: Activation,
}

impl DenseLayer {
    /// Create a layer using He (Kaiming) uniform initialization and a small
    /// positive bias.
    pub fn new<R: Rng>(
        in_features: usize,
        out_features: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        // He uniform: U(-sqrt(6/fan_in), sqrt(6/fan_in))
        let limit = (6.0f64 / in_features.max(1) as f64).sqrt();
        let weights: Matrix = (0..out_features)
            .map(|_| (0..in_features).map(|_| rng.gen_range(-limit..limit)).collect())
            .collect();
        let bias = vec![0.01; out_features];
        Self {
            weights,
            bias,
            activation,
        }
    }

    pub fn in_features(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    pub fn out_features(&self) -> usize {
        self.bias.len()
    }

    /// `a = act(x · Wᵀ + b)` for every row of `input`.
    pub fn forward(&self, input: &Tensor<f64>) -> Result<Tensor<f64>> {
        if input.shape().len() != 2 || input.row_len() != self.in_features() {
            return Err(Error::shape(
                "dense layer input",
                &[input.rows(), self.in_features()],
                input.shape(),
            ));
        }
        let mut out = Vec::with_capacity(input.rows() * self.out_features());
        for r in 0..input.rows() {
            let x = input.row(r);
            let start = out.len();
            out.extend(self.weights.iter().zip(&self.bias).map(|(row, &b)| {
                row.iter().zip(x).map(|(&w, &xi)| w * xi).sum::<f64>() + b
            }));
            self.activation.apply_in_place(&mut out[start..]);
        }
        Tensor::new(out, vec![input.rows(), self.out_features()])
            .map(|t| t.to_device(input.device()))
    }

    /// Weights flattened row-major, as stored in a state dict.
    pub fn flat_weights(&self) -> Vec<f64> {
        self.weights.iter().flatten().copied().collect()
    }

    /// Overwrite parameters from flat buffers; shapes must already match.
    pub fn assign(&mut self, weights: &[f64], bias: &[f64]) -> Result<()> {
        let (out_f, in_f) = (self.out_features(), self.in_features());
        if weights.len() != out_f * in_f {
            return Err(Error::shape("dense weights", &[out_f * in_f], &[weights.len()]));
        }
        if bias.len() != out_f {
            return Err(Error::shape("dense bias", &[out_f], &[bias.len()]));
        }
        for (row, chunk) in self.weights.iter_mut().zip(weights.chunks(in_f.max(1))) {
            row.copy_from_slice(chunk);
        }
        self.bias.copy_from_slice(bias);
        Ok(())
    }
}

/// Inverted dropout: zeroes each activation with probability `p` and scales
/// survivors by `1 / (1 - p)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dropout {
    pub p: f64,
}

impl Dropout {
    pub fn apply<R: Rng>(&self, input: Tensor<f64>, rng: &mut R) -> Result<Tensor<f64>> {
        if self.p <= 0.0 {
            return Ok(input);
        }
        let keep = 1.0 - self.p;
        let data = input
            .data()
            .iter()
            .map(|&v| if rng.gen_bool(keep) { v / keep } else { 0.0 })
            .collect();
        Tensor::new(data, input.shape().to_vec()).map(|t| t.to_device(input.device()))
    }
}
