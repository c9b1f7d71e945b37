//! Environment.
use crate::{error::KestrelError, FrameShape};
use anyhow::Result;

/// A pixel-based environment, such as an emulated arcade game.
///
/// One call of [`FrameEnv::act`] advances the emulator by a single raw frame.
/// The trainer repeats the chosen action [`FrameEnv::frame_skip`] times and
/// accumulates the rewards, so that one externally visible step consumes
/// several raw frames.
pub trait FrameEnv {
    /// Configurations.
    type Config: Clone;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Shape of the preprocessed observation.
    fn frame_shape(&self) -> FrameShape;

    /// Number of raw frames consumed per visible step.
    fn frame_skip(&self) -> usize {
        1
    }

    /// Every action id the environment accepts.
    fn legal_action_set(&self) -> Vec<i32>;

    /// The actions that have an effect in the current game.
    fn minimal_action_set(&self) -> Vec<i32> {
        self.legal_action_set()
    }

    /// Applies an action for a single raw frame and returns the reward.
    fn act(&mut self, action: i32) -> Result<f32>;

    /// Repeats an action for [`FrameEnv::frame_skip`] raw frames, stopping early
    /// at the end of the episode.
    ///
    /// Returns the summed reward and the number of raw frames consumed.
    fn step(&mut self, action: i32) -> Result<(f32, usize)> {
        let mut reward = 0.0;
        let mut n_frames = 0;
        while n_frames < self.frame_skip().max(1) {
            reward += self.act(action)?;
            n_frames += 1;
            if self.is_terminal() {
                break;
            }
        }
        Ok((reward, n_frames))
    }

    /// Returns `true` if the episode has ended.
    fn is_terminal(&self) -> bool;

    /// Starts a new episode.
    fn reset(&mut self) -> Result<()>;

    /// Writes the current preprocessed observation into `out`.
    ///
    /// `out.len()` equals `self.frame_shape().len()`.
    fn observation(&self, out: &mut [u8]);

    /// Raw frames elapsed in the current episode.
    fn episode_frame_number(&self) -> usize;
}

/// Maps action indices of the agent to action ids of the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSet(Vec<i32>);

impl ActionSet {
    /// Constructs an action set from environment action ids.
    pub fn new(actions: Vec<i32>) -> Self {
        Self(actions)
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there is no action.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the environment action id of the given index.
    pub fn get(&self, index: usize) -> Result<i32, KestrelError> {
        self.0
            .get(index)
            .copied()
            .ok_or(KestrelError::InvalidActionIndex {
                index,
                n_actions: self.0.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_set_rejects_unknown_index() {
        let actions = ActionSet::new(vec![0, 1, 3, 4]);
        assert_eq!(actions.get(2), Ok(3));
        assert_eq!(
            actions.get(4),
            Err(KestrelError::InvalidActionIndex {
                index: 4,
                n_actions: 4
            })
        );
    }
}
