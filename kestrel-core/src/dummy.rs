//! Deterministic test doubles of the environment and the Q-function.
use crate::{FrameEnv, FrameShape, QFunction};
use anyhow::{bail, Result};
use ndarray::{Array2, Array4, Axis};
use std::{
    cell::Cell,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`DummyEnv`].
#[derive(Clone, Debug, PartialEq)]
pub struct DummyEnvConfig {
    /// Shape of observations.
    pub frame_shape: FrameShape,

    /// Raw frames per episode.
    pub episode_length: usize,

    /// Raw frames per visible step.
    pub frame_skip: usize,

    /// Accepted action ids.
    pub legal_actions: Vec<i32>,

    /// Action ids with an effect.
    pub minimal_actions: Vec<i32>,

    /// The action id paying a reward of 1 per raw frame.
    pub rewarded_action: i32,
}

impl Default for DummyEnvConfig {
    fn default() -> Self {
        Self {
            frame_shape: FrameShape::new(4, 4),
            episode_length: 10,
            frame_skip: 1,
            legal_actions: (0..6).collect(),
            minimal_actions: vec![0, 1, 3],
            rewarded_action: 1,
        }
    }
}

/// A scripted environment.
///
/// Every pixel of the observation after `n` raw frames of an episode equals
/// `n % 255 + 1`. An episode ends after `episode_length` raw frames. Actions
/// are recorded.
pub struct DummyEnv {
    config: DummyEnvConfig,
    frame: usize,
    n_resets: usize,
    actions: Vec<i32>,
}

impl DummyEnv {
    /// Action ids passed to [`FrameEnv::act`] so far.
    pub fn actions(&self) -> &[i32] {
        &self.actions
    }

    /// Number of calls of [`FrameEnv::reset`].
    pub fn n_resets(&self) -> usize {
        self.n_resets
    }
}

impl FrameEnv for DummyEnv {
    type Config = DummyEnvConfig;

    fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            frame: 0,
            n_resets: 0,
            actions: vec![],
        })
    }

    fn frame_shape(&self) -> FrameShape {
        self.config.frame_shape
    }

    fn frame_skip(&self) -> usize {
        self.config.frame_skip
    }

    fn legal_action_set(&self) -> Vec<i32> {
        self.config.legal_actions.clone()
    }

    fn minimal_action_set(&self) -> Vec<i32> {
        self.config.minimal_actions.clone()
    }

    fn act(&mut self, action: i32) -> Result<f32> {
        if !self.config.legal_actions.contains(&action) {
            bail!("Action {} is not legal", action);
        }
        self.actions.push(action);
        self.frame += 1;
        Ok(if action == self.config.rewarded_action { 1.0 } else { 0.0 })
    }

    fn is_terminal(&self) -> bool {
        self.frame >= self.config.episode_length
    }

    fn reset(&mut self) -> Result<()> {
        self.frame = 0;
        self.n_resets += 1;
        Ok(())
    }

    fn observation(&self, out: &mut [u8]) {
        let v = (self.frame % 255 + 1) as u8;
        out.iter_mut().for_each(|p| *p = v);
    }

    fn episode_frame_number(&self) -> usize {
        self.frame
    }
}

/// A linear Q-function for tests.
///
/// `Q(obs, a) = params[a] + m(obs)`, where `m` is the mean pixel value of the
/// newest frame of the stack divided by 255. Forward calls are counted.
pub struct TableQ {
    params: Vec<f32>,
    learning_rate: f32,
    forward_calls: Cell<usize>,
}

impl TableQ {
    /// Constructs a Q-function with one parameter per action.
    pub fn new(params: Vec<f32>) -> Self {
        Self {
            params,
            learning_rate: 0.1,
            forward_calls: Cell::new(0),
        }
    }

    /// Sets the learning rate.
    pub fn learning_rate(mut self, v: f32) -> Self {
        self.learning_rate = v;
        self
    }

    /// Current parameters.
    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Number of calls of [`QFunction::forward`].
    pub fn forward_calls(&self) -> usize {
        self.forward_calls.get()
    }

    fn newest_frame_mean(obs: &Array4<u8>) -> Vec<f32> {
        obs.axis_iter(Axis(0))
            .map(|stack| {
                let frame = stack.index_axis(Axis(0), stack.shape()[0] - 1);
                frame.iter().map(|&p| p as f32).sum::<f32>() / (frame.len() as f32 * 255.0)
            })
            .collect()
    }
}

impl QFunction for TableQ {
    type Params = Vec<f32>;

    fn n_actions(&self) -> usize {
        self.params.len()
    }

    fn forward(&self, obs: &Array4<u8>) -> Result<Array2<f32>> {
        self.forward_calls.set(self.forward_calls.get() + 1);
        let m = Self::newest_frame_mean(obs);
        Ok(Array2::from_shape_fn((m.len(), self.params.len()), |(b, a)| {
            self.params[a] + m[b]
        }))
    }

    fn train_step(&mut self, obs: &Array4<u8>, target: &Array2<f32>) -> Result<f32> {
        let m = Self::newest_frame_mean(obs);
        let q = Array2::from_shape_fn(target.dim(), |(b, a)| self.params[a] + m[b]);
        let err = q - target;
        let n = err.shape()[0] as f32;

        for (a, col) in err.axis_iter(Axis(1)).enumerate() {
            self.params[a] -= self.learning_rate * col.sum() / n;
        }
        Ok(err.mapv(|e| e * e).mean().unwrap_or(0.0))
    }

    fn snapshot(&self) -> Result<Self::Params> {
        Ok(self.params.clone())
    }

    fn restore(&mut self, params: &Self::Params) -> Result<()> {
        if params.len() != self.params.len() {
            bail!(
                "Snapshot has {} parameters, expected {}",
                params.len(),
                self.params.len()
            );
        }
        self.params.copy_from_slice(params);
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self.params)?.as_bytes())?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let params: Vec<f32> = serde_yaml::from_reader(BufReader::new(File::open(path)?))?;
        self.restore(&params)
    }
}
