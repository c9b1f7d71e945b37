//! Uniform sampling of mini-batches.
use super::{ReplayBatch, ReplayStore, StackBuilder};
use crate::error::KestrelError;
use anyhow::Result;
use ndarray::Array4;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::collections::HashSet;

/// Draws mini-batches of distinct transitions uniformly at random.
///
/// Every stored transition except the newest one can be drawn: the next frame
/// of the newest transition has not been stored yet. While the store is filling
/// up this is the slot range `[0, cur_pos - 1)`.
pub struct BatchSampler {
    rng: SmallRng,
}

impl BatchSampler {
    /// Constructs a sampler with a seeded random number generator.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Returns `true` if `store` holds enough transitions for a batch of `size`.
    pub fn can_sample(store: &ReplayStore, size: usize) -> bool {
        store.len() > size + 1
    }

    /// Draws `size` distinct slots, or `None` if the store holds too few transitions.
    pub fn sample_ixs(&mut self, store: &ReplayStore, size: usize) -> Option<Vec<usize>> {
        if !Self::can_sample(store, size) {
            return None;
        }

        let n_valid = store.len() - 1;
        let oldest = store.oldest();
        let mut picked = HashSet::with_capacity(size);
        let mut ixs = Vec::with_capacity(size);

        // rejection of duplicates; fast as long as size << n_valid
        while ixs.len() < size {
            let ix = (oldest + self.rng.gen_range(0..n_valid)) % store.capacity();
            if picked.insert(ix) {
                ixs.push(ix);
            }
        }

        Some(ixs)
    }

    /// Draws a batch and materializes its frame stacks.
    ///
    /// Returns `Ok(None)` if the store holds too few transitions; this is the
    /// normal state at the start of a run, not an error.
    pub fn sample(&mut self, store: &ReplayStore, size: usize) -> Result<Option<ReplayBatch>> {
        let ixs = match self.sample_ixs(store, size) {
            Some(ixs) => ixs,
            None => return Ok(None),
        };

        let n_stack = store.n_stack();
        let shape = store.frame_shape();
        let stack_len = n_stack * shape.len();
        let builder = StackBuilder::new(store);

        let mut obs = vec![0u8; size * stack_len];
        let mut next_obs = Vec::with_capacity(size * stack_len);
        let mut next_rows = Vec::with_capacity(size);
        let mut act = Vec::with_capacity(size);
        let mut reward = Vec::with_capacity(size);
        let mut is_terminal = Vec::with_capacity(size);
        let mut next = vec![0u8; stack_len];

        for (row, (&ix, chunk)) in ixs.iter().zip(obs.chunks_exact_mut(stack_len)).enumerate() {
            builder.write_obs(ix, chunk)?;
            let tr = store.get(ix).ok_or(KestrelError::EmptySlot(ix))?;
            act.push(tr.action);
            reward.push(tr.reward);
            is_terminal.push(tr.is_terminal);

            if !tr.is_terminal {
                builder.write_next_obs(ix, chunk, &mut next)?;
                next_obs.extend_from_slice(&next);
                next_rows.push(row);
            }
        }

        let dim = |n| (n, n_stack, shape.height, shape.width);
        Ok(Some(ReplayBatch {
            obs: Array4::from_shape_vec(dim(size), obs)?,
            next_obs: Array4::from_shape_vec(dim(next_rows.len()), next_obs)?,
            ixs,
            act,
            reward,
            is_terminal,
            next_rows,
        }))
    }
}
