//! Experience replay for pixel observations.
//!
//! Transitions live in a [`ReplayStore`], a fixed-capacity circular log holding
//! each frame once, compressed with a [`FrameCodec`]. Stacked observations are
//! rebuilt on demand by a [`StackBuilder`], and a [`BatchSampler`] draws
//! mini-batches of distinct transitions as [`ReplayBatch`]es.
mod batch;
mod codec;
mod config;
mod sampler;
mod stack;
mod store;
pub use batch::ReplayBatch;
pub use codec::FrameCodec;
pub use config::ReplayStoreConfig;
pub use sampler::BatchSampler;
pub use stack::{FrameStack, StackBuilder};
pub use store::{ReplayStore, TransitionRef};
