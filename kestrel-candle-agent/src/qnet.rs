//! Q-network over stacked frames.
use crate::{
    mlp::{Mlp, MlpConfig},
    opt::{Optimizer, OptimizerConfig},
    util::{smooth_l1_loss, CriticLoss},
    Device,
};
use anyhow::{anyhow, bail, Result};
use candle_core::{DType, Tensor};
use candle_nn::{loss::mse, VarBuilder, VarMap};
use kestrel_core::{FrameShape, QFunction};
use log::info;
use ndarray::{Array2, Array4};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`QNet`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct QNetConfig {
    /// Number of stacked frames.
    pub n_stack: usize,

    /// Shape of a single frame.
    pub frame_shape: FrameShape,

    /// Widths of the hidden layers.
    pub units: Vec<usize>,

    /// Number of actions.
    pub n_actions: usize,

    /// Optimizer.
    pub opt_config: OptimizerConfig,

    /// Regression loss.
    #[serde(default)]
    pub critic_loss: CriticLoss,

    /// Device.
    #[serde(default)]
    pub device: Device,
}

impl Default for QNetConfig {
    fn default() -> Self {
        Self {
            n_stack: 4,
            frame_shape: FrameShape::default(),
            units: vec![256, 256],
            n_actions: 0,
            opt_config: OptimizerConfig::default(),
            critic_loss: CriticLoss::default(),
            device: Device::Cpu,
        }
    }
}

impl QNetConfig {
    /// Sets the number of stacked frames.
    pub fn n_stack(mut self, v: usize) -> Self {
        self.n_stack = v;
        self
    }

    /// Sets the frame shape.
    pub fn frame_shape(mut self, v: FrameShape) -> Self {
        self.frame_shape = v;
        self
    }

    /// Sets the widths of the hidden layers.
    pub fn units(mut self, v: Vec<usize>) -> Self {
        self.units = v;
        self
    }

    /// Sets the number of actions.
    pub fn n_actions(mut self, v: usize) -> Self {
        self.n_actions = v;
        self
    }

    /// Sets the optimizer.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the regression loss.
    pub fn critic_loss(mut self, v: CriticLoss) -> Self {
        self.critic_loss = v;
        self
    }

    /// Sets the device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }

    fn mlp_config(&self) -> MlpConfig {
        MlpConfig::new(
            self.n_stack * self.frame_shape.len(),
            self.units.clone(),
            self.n_actions,
        )
    }

    /// Constructs [`QNetConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`QNetConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// A multilayer perceptron Q-network with its own optimizer.
///
/// Pixels are scaled to `[0, 1]` and the frame stack is flattened.
pub struct QNet {
    device: candle_core::Device,
    varmap: VarMap,
    mlp: Mlp,
    opt: Optimizer,
    critic_loss: CriticLoss,
    in_dim: usize,
    n_actions: usize,
}

impl QNet {
    /// Constructs a randomly initialized Q-network.
    pub fn build(config: &QNetConfig) -> Result<Self> {
        let device = candle_core::Device::try_from(config.device)?;
        let varmap = VarMap::new();
        let mlp_config = config.mlp_config();
        let mlp = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            Mlp::build(vb, &mlp_config)?
        };
        let opt = config.opt_config.build(varmap.all_vars())?;

        Ok(Self {
            device,
            varmap,
            mlp,
            opt,
            critic_loss: config.critic_loss,
            in_dim: mlp_config.in_dim,
            n_actions: config.n_actions,
        })
    }

    fn input(&self, obs: &Array4<u8>) -> Result<Tensor> {
        let batch_size = obs.shape()[0];
        let len = obs.len() / batch_size.max(1);
        if len != self.in_dim {
            bail!(
                "Observation stack of {} pixels, the network expects {}",
                len,
                self.in_dim
            );
        }
        let data: Vec<f32> = obs.iter().map(|&p| p as f32 / 255.0).collect();
        Ok(Tensor::from_vec(data, (batch_size, self.in_dim), &self.device)?)
    }

    fn forward_tensor(&self, obs: &Array4<u8>) -> Result<Tensor> {
        self.mlp.forward(&self.input(obs)?)
    }
}

fn to_array2(t: &Tensor) -> Result<Array2<f32>> {
    let (n, m) = t.dims2()?;
    let data = t.flatten_all()?.to_vec1::<f32>()?;
    Ok(Array2::from_shape_vec((n, m), data)?)
}

impl QFunction for QNet {
    type Params = HashMap<String, Tensor>;

    fn n_actions(&self) -> usize {
        self.n_actions
    }

    fn forward(&self, obs: &Array4<u8>) -> Result<Array2<f32>> {
        to_array2(&self.forward_tensor(obs)?)
    }

    fn train_step(&mut self, obs: &Array4<u8>, target: &Array2<f32>) -> Result<f32> {
        let pred = self.forward_tensor(obs)?;
        let target = Tensor::from_vec(
            target.iter().copied().collect::<Vec<_>>(),
            target.dim(),
            &self.device,
        )?;
        let loss = match self.critic_loss {
            CriticLoss::Mse => mse(&pred, &target)?,
            CriticLoss::SmoothL1 => smooth_l1_loss(&pred, &target)?,
        };
        self.opt.backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    fn snapshot(&self) -> Result<Self::Params> {
        let data = self
            .varmap
            .data()
            .lock()
            .map_err(|e| anyhow!("Failed to lock parameters: {}", e))?;
        let params = data
            .iter()
            .map(|(k, v)| -> Result<(String, Tensor)> { Ok((k.clone(), v.as_tensor().copy()?)) })
            .collect::<Result<_>>()?;
        Ok(params)
    }

    fn restore(&mut self, params: &Self::Params) -> Result<()> {
        let data = self
            .varmap
            .data()
            .lock()
            .map_err(|e| anyhow!("Failed to lock parameters: {}", e))?;
        for (k, var) in data.iter() {
            match params.get(k) {
                Some(t) => var.set(t)?,
                None => bail!("Parameter {} is missing in the snapshot", k),
            }
        }
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.varmap.save(path)?;
        info!("Save Q-network to {:?}", path);
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        self.varmap.load(path)?;
        info!("Load Q-network from {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;
    use tempdir::TempDir;

    fn config() -> QNetConfig {
        QNetConfig::default()
            .n_stack(2)
            .frame_shape(FrameShape::new(3, 3))
            .units(vec![16])
            .n_actions(4)
            .opt_config(OptimizerConfig::Adam { lr: 1e-2 })
    }

    fn obs() -> Array4<u8> {
        Array::from_shape_fn((5, 2, 3, 3), |(b, k, h, w)| ((b * 37 + k * 11 + h * 5 + w) * 7 % 256) as u8)
    }

    #[test]
    fn test_forward_shape() -> Result<()> {
        let qnet = QNet::build(&config())?;
        assert_eq!(qnet.forward(&obs())?.dim(), (5, 4));
        assert!(qnet.forward(&Array4::zeros((1, 3, 3, 3))).is_err());
        Ok(())
    }

    #[test]
    fn test_train_step_reduces_loss() -> Result<()> {
        let mut qnet = QNet::build(&config())?;
        let target = Array2::from_shape_fn((5, 4), |(b, a)| (b as f32 - a as f32) * 0.5);
        let first = qnet.train_step(&obs(), &target)?;
        let mut last = first;
        for _ in 0..100 {
            last = qnet.train_step(&obs(), &target)?;
        }
        assert!(last < first, "{} >= {}", last, first);
        Ok(())
    }

    #[test]
    fn test_snapshot_and_restore() -> Result<()> {
        let online = QNet::build(&config())?;
        let mut target = QNet::build(&config())?;
        assert_ne!(online.forward(&obs())?, target.forward(&obs())?);

        let snapshot = online.snapshot()?;
        target.restore(&snapshot)?;
        assert_eq!(online.forward(&obs())?, target.forward(&obs())?);

        // the snapshot is detached from the online parameters
        let mut online = online;
        let before = target.forward(&obs())?;
        online.train_step(&obs(), &Array2::zeros((5, 4)))?;
        target.restore(&snapshot)?;
        assert_eq!(target.forward(&obs())?, before);
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = TempDir::new("qnet")?;
        let path = dir.path().join("qnet.safetensors");
        let qnet = QNet::build(&config())?;
        qnet.save(&path)?;

        let mut other = QNet::build(&config())?;
        other.load(&path)?;
        assert_eq!(qnet.forward(&obs())?, other.forward(&obs())?);
        Ok(())
    }
}
