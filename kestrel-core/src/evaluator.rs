//! Evaluate [`Policy`].
use crate::{record::Record, Policy};
use anyhow::Result;
mod default_evaluator;
pub use default_evaluator::DefaultEvaluator;

/// Evaluate [`Policy`].
pub trait Evaluator<P: Policy> {
    /// Runs evaluation episodes and returns a record holding `"eval_reward"`,
    /// the average episode return.
    ///
    /// The caller of this method needs to handle the internal state of `policy`,
    /// like training/evaluation mode.
    fn evaluate(&mut self, policy: &mut P) -> Result<Record>;
}
