//! Agent.
use super::Policy;
use crate::{record::Record, replay_buffer::ReplayStore};
use anyhow::Result;
use std::path::Path;

/// Represents a trainable policy.
pub trait Agent: Policy {
    /// Set the policy to training mode.
    fn train(&mut self);

    /// Set the policy to evaluation mode.
    fn eval(&mut self);

    /// Return if it is in training mode.
    fn is_train(&self) -> bool;

    /// Number of action indices the agent chooses from.
    fn n_actions(&self) -> usize;

    /// Number of transitions drawn per optimization step.
    fn batch_size(&self) -> usize;

    /// Notifies the agent that one environment interaction step was completed
    /// and its transition stored.
    ///
    /// Advances the exploration schedule and copies the online parameters into
    /// the target network when due. Returns `true` if a copy took place.
    fn observe_step(&mut self) -> Result<bool>;

    /// Performs an optimization step with a batch drawn from `store`.
    ///
    /// Returns `Ok(None)` if the store does not hold enough transitions yet.
    fn opt(&mut self, store: &ReplayStore) -> Result<Option<Record>>;

    /// Save the parameters of the agent in the given directory.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Load the parameters of the agent from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}
