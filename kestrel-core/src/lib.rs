#![warn(missing_docs)]
//! Core components of a deep Q-learning agent trained from pixels.
//!
//! The crate is organised around the experience-replay training loop:
//!
//! * [`replay_buffer`] stores compressed frames with their actions, rewards and
//!   termination flags in a fixed-capacity circular log, rebuilds stacked
//!   observation windows from it and draws mini-batches.
//! * [`dqn`] turns sampled batches into regression targets using an online and a
//!   periodically synchronised target [`QFunction`].
//! * [`Trainer`] drives environment interaction, storage, training and target
//!   synchronisation.
//!
//! The function approximator and the environment are external; they are plugged
//! in through the [`QFunction`] and [`FrameEnv`] traits.
pub mod dqn;
pub mod dummy;
pub mod error;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{ActionSet, Agent, FrameEnv, Policy, QFunction};

mod frame;
pub use frame::{FrameHistory, FrameShape};

mod evaluator;
pub use evaluator::{DefaultEvaluator, Evaluator};

mod trainer;
pub use trainer::{Phase, Trainer, TrainerConfig};
