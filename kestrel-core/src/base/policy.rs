//! Policy.
use anyhow::Result;
use ndarray::ArrayView3;

/// A mapping from a stack of frames `[n_stack, height, width]` to an action index.
pub trait Policy {
    /// Samples an action index given stacked observations.
    fn sample(&mut self, obs: ArrayView3<u8>) -> Result<usize>;
}
