//! Reconstruction of stacked observations from the replay store.
use super::ReplayStore;
use crate::error::KestrelError;
use ndarray::Array3;

/// Stacked observations of one stored transition.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStack {
    /// `[n_stack, height, width]` frames ending at the transition, oldest first.
    pub obs: Array3<u8>,

    /// The stack one step later, `None` if the transition is terminal.
    pub next_obs: Option<Array3<u8>>,
}

/// Rebuilds `n_stack`-frame windows ending at a slot of a [`ReplayStore`].
///
/// A window never reaches past the oldest surviving transition: frames that
/// would precede it are left all-zero. This covers both the warm-up period,
/// when fewer than `n_stack` transitions have been stored, and a full store,
/// where the slots before the oldest transition hold the newest ones.
pub struct StackBuilder<'a> {
    store: &'a ReplayStore,
}

impl<'a> StackBuilder<'a> {
    /// Constructs a builder reading from `store`.
    pub fn new(store: &'a ReplayStore) -> Self {
        Self { store }
    }

    fn prev(&self, ix: usize, j: usize) -> usize {
        let capacity = self.store.capacity();
        (ix + capacity - j % capacity) % capacity
    }

    /// Number of real frames preceding slot `t` in its window, at most `n_stack - 1`.
    pub fn history_len(&self, t: usize) -> usize {
        let mut n = (self.store.n_stack() - 1).min(self.store.age_rank(t));

        if self.store.truncate_at_episode_start() {
            // a terminal predecessor ends the previous episode
            if let Some(j) = (1..=n).find(|&j| self.store.is_terminal(self.prev(t, j))) {
                n = j - 1;
            }
        }

        n
    }

    /// Writes the window ending at slot `t` into `out`, oldest frame first.
    ///
    /// `out` has length `n_stack * frame_len`. Returns the number of real frames.
    pub fn write_obs(&self, t: usize, out: &mut [u8]) -> Result<usize, KestrelError> {
        if self.store.get(t).is_none() {
            return Err(KestrelError::EmptySlot(t));
        }

        let n_stack = self.store.n_stack();
        let frame_len = self.store.frame_shape().len();
        let n_real = self.history_len(t) + 1;

        for (k, chunk) in out.chunks_exact_mut(frame_len).enumerate() {
            // chunk k holds the frame n_stack - 1 - k steps before t
            let j = n_stack - 1 - k;
            if j < n_real {
                self.store.decode_frame(self.prev(t, j), chunk)?;
            } else {
                chunk.iter_mut().for_each(|p| *p = 0);
            }
        }

        Ok(n_real)
    }

    /// Writes the window ending one step after slot `t` into `out`.
    ///
    /// `obs` is the window previously written for `t` with [`StackBuilder::write_obs`].
    /// The caller makes sure `t` is not terminal.
    pub fn write_next_obs(&self, t: usize, obs: &[u8], out: &mut [u8]) -> Result<(), KestrelError> {
        if self.store.newest() == Some(t) {
            return Err(KestrelError::NoNextFrame(t));
        }

        let frame_len = self.store.frame_shape().len();
        let split = obs.len() - frame_len;
        out[..split].copy_from_slice(&obs[frame_len..]);
        self.store
            .decode_frame((t + 1) % self.store.capacity(), &mut out[split..])
    }

    /// Builds the current and, unless terminal, the next window of slot `t`.
    pub fn build(&self, t: usize) -> Result<FrameStack, KestrelError> {
        let shape = self.store.frame_shape();
        let dim = (self.store.n_stack(), shape.height, shape.width);
        let mut obs = vec![0u8; self.store.n_stack() * shape.len()];
        self.write_obs(t, &mut obs)?;

        let next_obs = if self.store.is_terminal(t) {
            None
        } else {
            let mut next = vec![0u8; obs.len()];
            self.write_next_obs(t, &obs, &mut next)?;
            Some(to_array3(dim, next)?)
        };

        Ok(FrameStack {
            obs: to_array3(dim, obs)?,
            next_obs,
        })
    }
}

fn to_array3(dim: (usize, usize, usize), data: Vec<u8>) -> Result<Array3<u8>, KestrelError> {
    Array3::from_shape_vec(dim, data).map_err(|e| KestrelError::DecodeCorruption(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{replay_buffer::ReplayStoreConfig, FrameShape};
    use ndarray::Axis;

    const SHAPE: FrameShape = FrameShape {
        height: 2,
        width: 2,
    };

    fn frame(v: u8) -> Vec<u8> {
        vec![v; SHAPE.len()]
    }

    fn store(capacity: usize, n_stack: usize, n: u8, terminal_at: &[u8]) -> ReplayStore {
        let config = ReplayStoreConfig::default()
            .capacity(capacity)
            .n_stack(n_stack)
            .frame_shape(SHAPE);
        let mut store = ReplayStore::build(&config).unwrap();
        // frame i is filled with i + 1 so that zero fill is distinguishable
        for i in 0..n {
            store
                .commit(&frame(i + 1), 0, 0.0, terminal_at.contains(&i))
                .unwrap();
        }
        store
    }

    // First pixel of each frame in the window.
    fn firsts(stack: &Array3<u8>) -> Vec<u8> {
        stack.axis_iter(Axis(0)).map(|f| f[[0, 0]]).collect()
    }

    #[test]
    fn test_full_history() {
        let store = store(8, 3, 5, &[]);
        let stack = StackBuilder::new(&store).build(3).unwrap();
        assert_eq!(firsts(&stack.obs), vec![2, 3, 4]);
        assert_eq!(firsts(stack.next_obs.as_ref().unwrap()), vec![3, 4, 5]);
    }

    #[test]
    fn test_zero_fill_during_warmup() {
        let store = store(8, 4, 3, &[]);
        let builder = StackBuilder::new(&store);
        assert_eq!(firsts(&builder.build(0).unwrap().obs), vec![0, 0, 0, 1]);
        let stack = builder.build(1).unwrap();
        assert_eq!(firsts(&stack.obs), vec![0, 0, 1, 2]);
        assert_eq!(firsts(stack.next_obs.as_ref().unwrap()), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_exactly_full_store_does_not_wrap_into_newer_slots() {
        // slots 0..4 hold frames 1..4, the cursor is back at 0
        let store = store(4, 3, 4, &[]);
        assert!(store.is_full());
        assert_eq!(store.cur_pos(), 0);

        let builder = StackBuilder::new(&store);
        assert_eq!(firsts(&builder.build(0).unwrap().obs), vec![0, 0, 1]);
        assert_eq!(firsts(&builder.build(1).unwrap().obs), vec![0, 1, 2]);
        assert_eq!(firsts(&builder.build(2).unwrap().obs), vec![1, 2, 3]);
    }

    #[test]
    fn test_wrapped_store_stops_at_oldest_slot() {
        // 7 commits into 5 slots: [6, 7, 3, 4, 5], oldest at slot 2
        let store = store(5, 3, 7, &[]);
        let builder = StackBuilder::new(&store);
        assert_eq!(firsts(&builder.build(2).unwrap().obs), vec![0, 0, 3]);
        assert_eq!(firsts(&builder.build(3).unwrap().obs), vec![0, 3, 4]);
        // walks backward across the end of the slot array
        let stack = builder.build(0).unwrap();
        assert_eq!(firsts(&stack.obs), vec![4, 5, 6]);
        assert_eq!(firsts(stack.next_obs.as_ref().unwrap()), vec![5, 6, 7]);
    }

    #[test]
    fn test_terminal_has_no_next_stack() {
        let store = store(8, 2, 4, &[1]);
        let stack = StackBuilder::new(&store).build(1).unwrap();
        assert_eq!(firsts(&stack.obs), vec![1, 2]);
        assert!(stack.next_obs.is_none());
    }

    #[test]
    fn test_newest_slot_has_no_next_frame() {
        let store = store(8, 2, 4, &[]);
        assert_eq!(
            StackBuilder::new(&store).build(3),
            Err(KestrelError::NoNextFrame(3))
        );
        assert_eq!(
            StackBuilder::new(&store).build(5),
            Err(KestrelError::EmptySlot(5))
        );
    }

    #[test]
    fn test_truncate_at_episode_start() {
        let config = ReplayStoreConfig::default()
            .capacity(8)
            .n_stack(3)
            .frame_shape(SHAPE)
            .truncate_at_episode_start(true);
        let mut store = ReplayStore::build(&config).unwrap();
        for i in 0..5u8 {
            store.commit(&frame(i + 1), 0, 0.0, i == 1).unwrap();
        }

        let builder = StackBuilder::new(&store);
        assert_eq!(firsts(&builder.build(3).unwrap().obs), vec![0, 3, 4]);
        assert_eq!(firsts(&builder.build(2).unwrap().obs), vec![0, 0, 3]);
        assert_eq!(firsts(&builder.build(1).unwrap().obs), vec![0, 1, 2]);
    }
}
