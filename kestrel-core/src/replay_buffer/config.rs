//! Configuration of [`ReplayStore`](super::ReplayStore).
use super::FrameCodec;
use crate::{error::KestrelError, FrameShape};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`ReplayStore`](super::ReplayStore).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayStoreConfig {
    /// Maximum number of transitions.
    pub capacity: usize,

    /// Number of frames in an observation stack.
    pub n_stack: usize,

    /// Shape of a single frame.
    pub frame_shape: FrameShape,

    /// Encoding of stored frames.
    #[serde(default)]
    pub codec: FrameCodec,

    /// Seed of the batch sampler.
    pub seed: u64,

    /// Stop a stack at the first frame of an episode instead of reaching into
    /// the end of the previous one.
    #[serde(default)]
    pub truncate_at_episode_start: bool,
}

impl Default for ReplayStoreConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            n_stack: 4,
            frame_shape: FrameShape::default(),
            codec: FrameCodec::default(),
            seed: 42,
            truncate_at_episode_start: false,
        }
    }
}

impl ReplayStoreConfig {
    /// Sets the capacity.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the number of stacked frames.
    pub fn n_stack(mut self, n_stack: usize) -> Self {
        self.n_stack = n_stack;
        self
    }

    /// Sets the frame shape.
    pub fn frame_shape(mut self, frame_shape: FrameShape) -> Self {
        self.frame_shape = frame_shape;
        self
    }

    /// Sets the frame codec.
    pub fn codec(mut self, codec: FrameCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Stops stacks at episode boundaries.
    pub fn truncate_at_episode_start(mut self, v: bool) -> Self {
        self.truncate_at_episode_start = v;
        self
    }

    pub(super) fn validate(&self) -> Result<(), KestrelError> {
        if self.capacity == 0 {
            return Err(KestrelError::InvalidConfig("capacity must be positive".into()));
        }
        if self.n_stack == 0 {
            return Err(KestrelError::InvalidConfig("n_stack must be positive".into()));
        }
        if self.frame_shape.is_empty() {
            return Err(KestrelError::InvalidConfig("frame shape is empty".into()));
        }
        Ok(())
    }

    /// Constructs [`ReplayStoreConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ReplayStoreConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
