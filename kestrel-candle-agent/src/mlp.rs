//! Multilayer perceptron.
use anyhow::{bail, Result};
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Mlp`].
pub struct MlpConfig {
    /// Input dimension.
    pub in_dim: usize,

    /// Widths of the hidden layers.
    pub units: Vec<usize>,

    /// Output dimension.
    pub out_dim: usize,
}

impl MlpConfig {
    /// Creates configuration of MLP.
    pub fn new(in_dim: usize, units: Vec<usize>, out_dim: usize) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
        }
    }
}

/// Multilayer perceptron with ReLU activation function in the hidden layers.
pub struct Mlp {
    layers: Vec<Linear>,
}

impl Mlp {
    /// Creates the layers under the prefix `mlp` of `vs`.
    pub fn build(vs: VarBuilder, config: &MlpConfig) -> Result<Self> {
        if config.in_dim == 0 || config.out_dim == 0 {
            bail!("MLP dimensions must be positive: {:?}", config);
        }
        let dims: Vec<usize> = std::iter::once(config.in_dim)
            .chain(config.units.iter().copied())
            .chain(std::iter::once(config.out_dim))
            .collect();
        let vs = vs.pp("mlp");

        let layers = dims
            .windows(2)
            .enumerate()
            .map(|(i, w)| linear(w[0], w[1], vs.pp(format!("ln{}", i))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { layers })
    }

    /// Forward pass, `xs` has shape `[batch, in_dim]`.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let n_layers = self.layers.len();
        let mut xs = xs.clone();

        for (i, layer) in self.layers.iter().enumerate() {
            xs = layer.forward(&xs)?;
            if i + 1 < n_layers {
                xs = xs.relu()?;
            }
        }

        Ok(xs)
    }
}
