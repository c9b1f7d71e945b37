//! Bootstrapped regression targets.
use super::explorer::argmax;
use crate::{error::KestrelError, replay_buffer::ReplayBatch, QFunction};
use anyhow::Result;
use ndarray::{Array2, Axis};

/// Computes the regression targets of a sampled batch.
///
/// The target of sample `i` is the online prediction `Q_online(obs_i, .)` with
/// the entry of the taken action `a_i` replaced by
///
/// * `r_i + gamma * max_a Q_target(next_obs_i, a)` if the transition is not terminal,
/// * `r_i` if it is.
///
/// Entries of the other actions equal the prediction, so a dense regression
/// loss only trains the taken action.
///
/// With `double_dqn`, the bootstrap value is `Q_target(next_obs_i, argmax_a Q_online(next_obs_i, a))`.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetComputer {
    discount_factor: f32,
    double_dqn: bool,
}

impl TargetComputer {
    /// Constructs a target computer.
    pub fn new(discount_factor: f32, double_dqn: bool) -> Self {
        Self {
            discount_factor,
            double_dqn,
        }
    }

    /// Bootstrap values, one per row of the next-state batch.
    ///
    /// `q_online_next` is only used for Double DQN.
    pub fn bootstrap_values(
        &self,
        q_target_next: &Array2<f32>,
        q_online_next: Option<&Array2<f32>>,
    ) -> Vec<f32> {
        match q_online_next {
            Some(q_online_next) if self.double_dqn => q_target_next
                .axis_iter(Axis(0))
                .zip(q_online_next.axis_iter(Axis(0)))
                .map(|(qt, qo)| qt[argmax(qo)])
                .collect(),
            _ => q_target_next
                .axis_iter(Axis(0))
                .map(|qt| qt.fold(f32::NEG_INFINITY, |m, &v| m.max(v)))
                .collect(),
        }
    }

    /// Overwrites the taken-action entries of `q_online` with the targets.
    ///
    /// `bootstrap[j]` is the bootstrap value of the sample at `batch.next_rows[j]`.
    /// Fails with [`KestrelError::InvalidActionIndex`] if a stored action has no
    /// column in `q_online`.
    pub fn targets(
        &self,
        batch: &ReplayBatch,
        mut q_online: Array2<f32>,
        bootstrap: &[f32],
    ) -> Result<Array2<f32>, KestrelError> {
        let n_actions = q_online.ncols();
        if let Some(&index) = batch.act.iter().find(|&&a| a >= n_actions) {
            return Err(KestrelError::InvalidActionIndex { index, n_actions });
        }

        for i in 0..batch.len() {
            q_online[[i, batch.act[i]]] = batch.reward[i];
        }
        for (&i, &v) in batch.next_rows.iter().zip(bootstrap) {
            q_online[[i, batch.act[i]]] = batch.reward[i] + self.discount_factor * v;
        }
        Ok(q_online)
    }

    /// Computes the targets of `batch` with the online and the target network.
    ///
    /// The target network only sees next-state stacks of non-terminal samples
    /// and is not called at all if every sample is terminal.
    pub fn compute<Q: QFunction>(&self, batch: &ReplayBatch, online: &Q, target: &Q) -> Result<Array2<f32>> {
        let q_online = online.forward(&batch.obs)?;

        let bootstrap = if batch.next_rows.is_empty() {
            vec![]
        } else {
            let q_target_next = target.forward(&batch.next_obs)?;
            let q_online_next = match self.double_dqn {
                true => Some(online.forward(&batch.next_obs)?),
                false => None,
            };
            self.bootstrap_values(&q_target_next, q_online_next.as_ref())
        };

        Ok(self.targets(batch, q_online, &bootstrap)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array4};

    fn batch(act: Vec<usize>, reward: Vec<f32>, is_terminal: Vec<bool>) -> ReplayBatch {
        let n = act.len();
        let next_rows: Vec<usize> = (0..n).filter(|&i| !is_terminal[i]).collect();
        ReplayBatch {
            ixs: (0..n).collect(),
            obs: Array4::zeros((n, 1, 1, 1)),
            next_obs: Array4::zeros((next_rows.len(), 1, 1, 1)),
            act,
            reward,
            is_terminal,
            next_rows,
        }
    }

    #[test]
    fn test_only_taken_action_changes() {
        let tc = TargetComputer::new(0.9, false);
        let b = batch(vec![1, 0], vec![0.5, -1.0], vec![false, true]);
        let q = arr2(&[[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let q_next = arr2(&[[0.25f32, 2.5, -3.0]]);

        let bootstrap = tc.bootstrap_values(&q_next, None);
        assert_eq!(bootstrap, vec![2.5]);

        let t = tc.targets(&b, q, &bootstrap).unwrap();
        assert_eq!(t, arr2(&[[1.0, 0.5 + 0.9 * 2.5, 3.0], [-1.0, 5.0, 6.0]]));
    }

    #[test]
    fn test_double_dqn_evaluates_online_choice() {
        let tc = TargetComputer::new(0.99, true);
        let q_target_next = arr2(&[[1.0f32, 7.0, 3.0]]);
        let q_online_next = arr2(&[[0.0f32, 1.0, 2.0]]);
        assert_eq!(
            tc.bootstrap_values(&q_target_next, Some(&q_online_next)),
            vec![3.0]
        );

        // plain DQN ignores the online values
        let tc = TargetComputer::new(0.99, false);
        assert_eq!(
            tc.bootstrap_values(&q_target_next, Some(&q_online_next)),
            vec![7.0]
        );
    }

    #[test]
    fn test_action_outside_the_output_is_an_error() {
        let tc = TargetComputer::new(0.9, false);
        let b = batch(vec![0, 2], vec![0.0, 0.0], vec![true, true]);
        let q = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]);
        assert_eq!(
            tc.targets(&b, q, &[]),
            Err(KestrelError::InvalidActionIndex {
                index: 2,
                n_actions: 2
            })
        );
    }
}
