//! Action-value function approximator.
use anyhow::Result;
use ndarray::{Array2, Array4};
use std::path::Path;

/// A learned action-value function over stacked frames.
///
/// Inputs are batches of frame stacks with shape `[batch, n_stack, height, width]`;
/// outputs are action values with shape `[batch, n_actions]`.
///
/// The online and the target network of a DQN agent are two independently owned
/// instances of the same implementation. Parameters flow from one to the other
/// only through [`QFunction::snapshot`] and [`QFunction::restore`].
pub trait QFunction {
    /// A detached copy of all parameters.
    type Params;

    /// Number of actions, the width of the output.
    fn n_actions(&self) -> usize;

    /// Computes action values.
    fn forward(&self, obs: &Array4<u8>) -> Result<Array2<f32>>;

    /// Regresses the output on `target` with one gradient step, returns the loss.
    fn train_step(&mut self, obs: &Array4<u8>, target: &Array2<f32>) -> Result<f32>;

    /// Copies out all parameters.
    fn snapshot(&self) -> Result<Self::Params>;

    /// Replaces all parameters with a snapshot.
    fn restore(&mut self, params: &Self::Params) -> Result<()>;

    /// Saves parameters into a file.
    fn save(&self, path: &Path) -> Result<()>;

    /// Loads parameters from a file.
    fn load(&mut self, path: &Path) -> Result<()>;
}
