//! Core traits.
mod agent;
mod env;
mod policy;
mod q_function;
pub use agent::Agent;
pub use env::{ActionSet, FrameEnv};
pub use policy::Policy;
pub use q_function::QFunction;
