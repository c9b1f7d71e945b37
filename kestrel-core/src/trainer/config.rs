//! Configuration of [`Trainer`](super::Trainer).
use crate::error::KestrelError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
///
/// Intervals are counted in environment steps, except `record_interval`
/// which is counted in optimization steps. An interval of 0 disables the
/// corresponding action.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// Budget of raw frames consumed from the environment.
    pub max_frames: usize,

    /// Interval of optimization steps in environment steps.
    pub opt_interval: usize,

    /// Environment steps before the first optimization step.
    pub warmup_period: usize,

    /// Rewards stored for training are clipped to `[-v, v]`.
    pub clip_reward: Option<f32>,

    /// Action index used while the frame window fills up.
    pub default_action: usize,

    /// Interval of evaluation in environment steps.
    pub eval_interval: usize,

    /// Cap on the visible steps of a training episode.
    pub max_episode_length: usize,

    /// Interval of recording agent information in optimization steps.
    pub record_interval: usize,

    /// Interval of flushing records in environment steps.
    pub flush_record_interval: usize,

    /// Interval of saving model parameters in environment steps.
    pub save_interval: usize,

    /// Where to save the trained model.
    pub model_dir: Option<String>,

    /// Act with the minimal instead of the legal action set.
    pub use_minimal_action_set: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_frames: 10_000_000,
            opt_interval: 1,
            warmup_period: 0,
            clip_reward: Some(1.0),
            default_action: 0,
            eval_interval: 0,
            max_episode_length: 0,
            record_interval: 1,
            flush_record_interval: 10_000,
            save_interval: 0,
            model_dir: None,
            use_minimal_action_set: true,
        }
    }
}

impl TrainerConfig {
    /// Sets the budget of raw frames.
    pub fn max_frames(mut self, v: usize) -> Self {
        self.max_frames = v;
        self
    }

    /// Sets the interval of optimization in environment steps.
    pub fn opt_interval(mut self, v: usize) -> Self {
        self.opt_interval = v;
        self
    }

    /// Sets warmup period in environment steps.
    pub fn warmup_period(mut self, v: usize) -> Self {
        self.warmup_period = v;
        self
    }

    /// Sets reward clipping.
    pub fn clip_reward(mut self, v: Option<f32>) -> Self {
        self.clip_reward = v;
        self
    }

    /// Sets the default action index.
    pub fn default_action(mut self, v: usize) -> Self {
        self.default_action = v;
        self
    }

    /// Sets the interval of evaluation in environment steps.
    pub fn eval_interval(mut self, v: usize) -> Self {
        self.eval_interval = v;
        self
    }

    /// Sets the cap on the length of training episodes.
    pub fn max_episode_length(mut self, v: usize) -> Self {
        self.max_episode_length = v;
        self
    }

    /// Sets the interval of recording agent information in optimization steps.
    pub fn record_interval(mut self, v: usize) -> Self {
        self.record_interval = v;
        self
    }

    /// Sets the interval of flushing records in environment steps.
    pub fn flush_record_interval(mut self, v: usize) -> Self {
        self.flush_record_interval = v;
        self
    }

    /// Sets the interval of saving in environment steps.
    pub fn save_interval(mut self, v: usize) -> Self {
        self.save_interval = v;
        self
    }

    /// Sets the directory the trained model is saved in.
    pub fn model_dir(mut self, v: impl Into<String>) -> Self {
        self.model_dir = Some(v.into());
        self
    }

    /// Chooses between the minimal and the legal action set.
    pub fn use_minimal_action_set(mut self, v: bool) -> Self {
        self.use_minimal_action_set = v;
        self
    }

    pub(super) fn validate(&self) -> Result<(), KestrelError> {
        if self.opt_interval == 0 {
            return Err(KestrelError::InvalidConfig("opt_interval must be positive".into()));
        }
        if matches!(self.clip_reward, Some(v) if v <= 0.0) {
            return Err(KestrelError::InvalidConfig("clip_reward must be positive".into()));
        }
        if (self.eval_interval > 0 || self.save_interval > 0) && self.model_dir.is_none() {
            log::warn!("model_dir is not set, models will not be saved");
        }
        Ok(())
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_trainer_config() -> Result<()> {
        let config = TrainerConfig::default()
            .max_frames(100)
            .eval_interval(10000)
            .clip_reward(None)
            .model_dir("some/directory");

        let dir = TempDir::new("trainer_config")?;
        let path = dir.path().join("trainer_config.yaml");
        config.save(&path)?;
        let config_ = TrainerConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_zero_opt_interval_is_rejected() {
        assert!(TrainerConfig::default().opt_interval(0).validate().is_err());
        assert!(TrainerConfig::default().clip_reward(Some(0.0)).validate().is_err());
    }
}
