//! Configuration of DQN agent.
use super::EpsilonGreedy;
use crate::error::KestrelError;
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Dqn`](super::Dqn).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DqnConfig {
    /// Number of transitions per optimization step.
    pub batch_size: usize,

    /// Discount factor of the bootstrap term.
    pub discount_factor: f32,

    /// Environment steps between two copies of the online parameters into the
    /// target network.
    pub target_sync_interval: usize,

    /// Exploration in training mode.
    pub explorer: EpsilonGreedy,

    /// Probability of a random action in evaluation mode.
    pub eval_epsilon: f64,

    /// Select the bootstrap action with the online network.
    #[serde(default)]
    pub double_dqn: bool,

    /// Seed of action selection and batch sampling.
    pub seed: u64,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            discount_factor: 0.99,
            target_sync_interval: 10_000,
            explorer: EpsilonGreedy::default(),
            eval_epsilon: 0.05,
            double_dqn: false,
            seed: 42,
        }
    }
}

impl DqnConfig {
    /// Batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f32) -> Self {
        self.discount_factor = v;
        self
    }

    /// Target network sync interval in environment steps.
    pub fn target_sync_interval(mut self, v: usize) -> Self {
        self.target_sync_interval = v;
        self
    }

    /// Explorer.
    pub fn explorer(mut self, v: EpsilonGreedy) -> Self {
        self.explorer = v;
        self
    }

    /// Epsilon in evaluation mode.
    pub fn eval_epsilon(mut self, v: f64) -> Self {
        self.eval_epsilon = v;
        self
    }

    /// Double DQN.
    pub fn double_dqn(mut self, v: bool) -> Self {
        self.double_dqn = v;
        self
    }

    /// Random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    pub(super) fn validate(&self) -> Result<(), KestrelError> {
        if self.batch_size == 0 {
            return Err(KestrelError::InvalidConfig("batch_size must be positive".into()));
        }
        if self.target_sync_interval == 0 {
            return Err(KestrelError::InvalidConfig(
                "target_sync_interval must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.discount_factor) {
            return Err(KestrelError::InvalidConfig(format!(
                "discount_factor {} is outside of [0, 1]",
                self.discount_factor
            )));
        }
        Ok(())
    }

    /// Loads [`DqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of DQN agent from {}", path_.display());
        Ok(b)
    }

    /// Saves [`DqnConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of DQN agent into {}", path_.display());
        Ok(())
    }
}
