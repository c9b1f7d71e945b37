//! Fixed-capacity circular log of transitions.
use super::{FrameCodec, ReplayStoreConfig};
use crate::{error::KestrelError, FrameShape};
use anyhow::Result;
use log::trace;

/// A read-only view of the transition stored in one slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionRef<'a> {
    /// The compressed frame.
    pub encoded_frame: &'a [u8],

    /// The action taken when leaving the frame.
    pub action: usize,

    /// Reward received for the action, summed over skipped frames.
    pub reward: f32,

    /// `true` if the episode ended right after the frame.
    pub is_terminal: bool,
}

// Fields of the transition being assembled with the four-call protocol.
#[derive(Debug, Default)]
struct Staged {
    frame: Option<Vec<u8>>,
    action: Option<usize>,
    is_terminal: bool,
}

/// Fixed-capacity circular log of transitions.
///
/// Each slot holds a compressed frame, the action taken from that frame, the
/// reward received for it and a flag telling if the episode ended right after
/// the frame. Fields are kept in parallel columns that are never exposed; a
/// transition becomes visible only when all four fields are written, at which
/// point the insertion cursor moves past its slot.
///
/// Once the store is full, every commit silently overwrites the oldest transition,
/// which lives at the cursor.
pub struct ReplayStore {
    capacity: usize,
    n_stack: usize,
    frame_shape: FrameShape,
    codec: FrameCodec,
    truncate_at_episode_start: bool,

    frames: Vec<Vec<u8>>,
    actions: Vec<usize>,
    rewards: Vec<f32>,
    terminals: Vec<bool>,

    /// Next slot to be written.
    cur_pos: usize,

    /// `min(number of commits, capacity)`.
    num_stored: usize,

    staged: Staged,
}

impl ReplayStore {
    /// Constructs an empty store.
    pub fn build(config: &ReplayStoreConfig) -> Result<Self> {
        config.validate()?;
        let capacity = config.capacity;

        Ok(Self {
            capacity,
            n_stack: config.n_stack,
            frame_shape: config.frame_shape,
            codec: config.codec,
            truncate_at_episode_start: config.truncate_at_episode_start,
            frames: vec![Vec::new(); capacity],
            actions: vec![0; capacity],
            rewards: vec![0.0; capacity],
            terminals: vec![false; capacity],
            cur_pos: 0,
            num_stored: 0,
            staged: Staged::default(),
        })
    }

    /// Stages the frame of the next transition.
    pub fn store_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.staged.frame = Some(self.codec.encode(frame, self.frame_shape)?);
        Ok(())
    }

    /// Sets the action of a transition.
    ///
    /// With a frame staged, the action is staged along with it. Otherwise it
    /// belongs to the most recently committed transition, which lets callers
    /// store the four fields in the order frame, termination, reward, action.
    pub fn store_action(&mut self, action: usize) -> Result<()> {
        if self.staged.frame.is_some() {
            self.staged.action = Some(action);
            return Ok(());
        }
        match self.newest() {
            Some(ix) => {
                self.actions[ix] = action;
                Ok(())
            }
            None => Err(KestrelError::IncompleteTransition.into()),
        }
    }

    /// Stages the termination flag of the staged transition.
    pub fn store_termination(&mut self, is_terminal: bool) {
        self.staged.is_terminal = is_terminal;
    }

    /// Stores the reward and commits the staged transition.
    ///
    /// This is the only call of the four-call protocol that advances the cursor.
    /// A transition closed before its action was stored gets action `0` until
    /// [`ReplayStore::store_action`] follows.
    pub fn store_reward(&mut self, reward: f32) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        let frame = staged.frame.ok_or(KestrelError::IncompleteTransition)?;
        self.write_slot(frame, staged.action.unwrap_or(0), reward, staged.is_terminal);
        Ok(())
    }

    /// Writes a complete transition in one step.
    ///
    /// Any partially staged transition is discarded.
    pub fn commit(&mut self, frame: &[u8], action: usize, reward: f32, is_terminal: bool) -> Result<()> {
        let encoded = self.codec.encode(frame, self.frame_shape)?;
        self.staged = Staged::default();
        self.write_slot(encoded, action, reward, is_terminal);
        Ok(())
    }

    fn write_slot(&mut self, encoded: Vec<u8>, action: usize, reward: f32, is_terminal: bool) {
        let i = self.cur_pos;
        trace!(
            "slot {}: {} bytes, action {}, reward {}, terminal {}",
            i,
            encoded.len(),
            action,
            reward,
            is_terminal
        );

        self.frames[i] = encoded;
        self.actions[i] = action;
        self.rewards[i] = reward;
        self.terminals[i] = is_terminal;

        self.cur_pos = (i + 1) % self.capacity;
        self.num_stored = (self.num_stored + 1).min(self.capacity);
    }

    /// Forgets all transitions. The capacity is kept.
    pub fn clear(&mut self) {
        self.frames.iter_mut().for_each(|f| *f = Vec::new());
        self.actions.iter_mut().for_each(|a| *a = 0);
        self.rewards.iter_mut().for_each(|r| *r = 0.0);
        self.terminals.iter_mut().for_each(|t| *t = false);
        self.cur_pos = 0;
        self.num_stored = 0;
        self.staged = Staged::default();
    }

    /// Number of stored transitions.
    pub fn len(&self) -> usize {
        self.num_stored
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.num_stored == 0
    }

    /// Maximum number of transitions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slot the next transition will be written to.
    pub fn cur_pos(&self) -> usize {
        self.cur_pos
    }

    /// Returns `true` if the next commit overwrites a transition.
    pub fn is_full(&self) -> bool {
        self.num_stored == self.capacity
    }

    /// Slot of the oldest surviving transition.
    pub fn oldest(&self) -> usize {
        if self.is_full() {
            self.cur_pos
        } else {
            0
        }
    }

    /// Slot of the most recent transition, if any.
    pub fn newest(&self) -> Option<usize> {
        match self.num_stored {
            0 => None,
            _ => Some((self.cur_pos + self.capacity - 1) % self.capacity),
        }
    }

    /// Number of stored transitions older than the one in slot `ix`.
    ///
    /// Meaningful only for slots holding a transition.
    pub fn age_rank(&self, ix: usize) -> usize {
        (ix + self.capacity - self.oldest()) % self.capacity
    }

    /// Number of frames in an observation stack.
    pub fn n_stack(&self) -> usize {
        self.n_stack
    }

    /// Shape of a single frame.
    pub fn frame_shape(&self) -> FrameShape {
        self.frame_shape
    }

    pub(super) fn truncate_at_episode_start(&self) -> bool {
        self.truncate_at_episode_start
    }

    /// Returns the transition in slot `ix`, or `None` if the slot is empty.
    pub fn get(&self, ix: usize) -> Option<TransitionRef<'_>> {
        if ix >= self.capacity || (!self.is_full() && ix >= self.num_stored) {
            return None;
        }

        Some(TransitionRef {
            encoded_frame: &self.frames[ix],
            action: self.actions[ix],
            reward: self.rewards[ix],
            is_terminal: self.terminals[ix],
        })
    }

    /// Returns `true` if the transition in slot `ix` ended its episode.
    pub fn is_terminal(&self, ix: usize) -> bool {
        self.terminals[ix]
    }

    /// Decompresses the frame in slot `ix` into `out`.
    pub fn decode_frame(&self, ix: usize, out: &mut [u8]) -> Result<(), KestrelError> {
        self.codec.decode(&self.frames[ix], self.frame_shape, out)
    }

    /// Total size of the compressed frames in bytes.
    pub fn encoded_bytes(&self) -> usize {
        self.frames.iter().map(|f| f.len()).sum()
    }
}
