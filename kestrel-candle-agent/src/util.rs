//! Utilities.
use candle_core::{DType, Tensor};
use serde::{Deserialize, Serialize};

/// Regression loss of the Q-network.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum CriticLoss {
    /// Mean squared error.
    Mse,

    /// Smooth L1 loss, less sensitive to large TD errors.
    SmoothL1,
}

impl Default for CriticLoss {
    fn default() -> Self {
        Self::SmoothL1
    }
}

/// See <https://pytorch.org/docs/stable/generated/torch.nn.SmoothL1Loss.html>.
pub fn smooth_l1_loss(x: &Tensor, y: &Tensor) -> Result<Tensor, candle_core::Error> {
    let d = (x - y)?.abs()?;
    let m1 = d.lt(1.0)?.to_dtype(DType::F32)?;
    let m2 = m1.affine(-1.0, 1.0)?;
    (((0.5 * m1)? * d.powf(2.0))? + (m2 * (d - 0.5)?)?)?.mean_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_smooth_l1_loss() -> anyhow::Result<()> {
        let x = Tensor::from_slice(&[0.0f32, 0.0, 0.0, 0.0], (2, 2), &Device::Cpu)?;
        let y = Tensor::from_slice(&[0.5f32, -0.5, 3.0, -2.0], (2, 2), &Device::Cpu)?;
        // 0.125 + 0.125 + 2.5 + 1.5
        let loss = smooth_l1_loss(&x, &y)?.to_scalar::<f32>()?;
        assert!((loss - 4.25 / 4.0).abs() < 1e-6);
        Ok(())
    }
}
