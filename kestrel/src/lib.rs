//! Deep Q-learning from pixels with compressed experience replay.
//!
//! Kestrel consists of the following crates:
//!
//! * [kestrel-core](kestrel_core) provides the replay store, the DQN agent,
//!   the training loop and the traits plugging in environments and
//!   Q-functions.
//! * [kestrel-candle-agent](kestrel_candle_agent) implements a Q-network
//!   with [candle](https://crates.io/crates/candle-core).
//! * [kestrel-tensorboard](kestrel_tensorboard) writes training records as
//!   TensorBoard summaries.
//!
//! This crate adds [`catch::CatchEnv`], a small pixel game used by the
//! `dqn_catch` example.
pub mod catch;
pub use kestrel_candle_agent;
pub use kestrel_core;
pub use kestrel_tensorboard;
