//! DQN agent.
//!
//! [`Dqn`] owns two independent instances of a [`QFunction`](crate::QFunction):
//! the online network, trained every optimization step, and the target network,
//! used only to compute bootstrapped regression targets. A [`SyncScheduler`]
//! replaces the target parameters with a snapshot of the online ones every
//! `target_sync_interval` environment steps.
mod base;
mod config;
mod explorer;
mod sync;
mod target;
pub use base::Dqn;
pub use config::DqnConfig;
pub use explorer::EpsilonGreedy;
pub use sync::SyncScheduler;
pub use target::TargetComputer;
