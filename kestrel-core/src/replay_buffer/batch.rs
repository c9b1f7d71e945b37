//! Mini-batches of stored transitions.
use ndarray::Array4;

/// A mini-batch of distinct transitions drawn from a
/// [`ReplayStore`](super::ReplayStore).
///
/// Next-state stacks exist only for non-terminal samples. Row `i` of
/// `next_obs` belongs to the sample at batch position `next_rows[i]`.
#[derive(Debug, Clone)]
pub struct ReplayBatch {
    /// Slots of the sampled transitions.
    pub ixs: Vec<usize>,

    /// Current-state stacks, `[batch, n_stack, height, width]`.
    pub obs: Array4<u8>,

    /// Action indices.
    pub act: Vec<usize>,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Termination flags.
    pub is_terminal: Vec<bool>,

    /// Next-state stacks of the non-terminal samples.
    pub next_obs: Array4<u8>,

    /// Batch positions of the rows of `next_obs`.
    pub next_rows: Vec<usize>,
}

impl ReplayBatch {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.ixs.len()
    }

    /// Returns `true` if the batch has no sample.
    pub fn is_empty(&self) -> bool {
        self.ixs.is_empty()
    }
}
