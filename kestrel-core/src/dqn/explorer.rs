//! Epsilon-greedy exploration.
use ndarray::ArrayView1;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Epsilon-greedy action selection with a linearly annealed epsilon.
///
/// Epsilon moves from `eps_start` to `eps_final` over the first `final_step`
/// environment steps and stays at `eps_final` afterwards.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    /// Epsilon at step 0.
    pub eps_start: f64,

    /// Floor of epsilon.
    pub eps_final: f64,

    /// Step at which epsilon reaches the floor.
    pub final_step: usize,
}

impl Default for EpsilonGreedy {
    fn default() -> Self {
        Self {
            eps_start: 1.0,
            eps_final: 0.1,
            final_step: 1_000_000,
        }
    }
}

impl EpsilonGreedy {
    /// Constructs an explorer annealing over `final_step` steps.
    pub fn with_final_step(final_step: usize) -> Self {
        Self {
            final_step,
            ..Default::default()
        }
    }

    /// Set the epsilon value at the start.
    pub fn eps_start(mut self, v: f64) -> Self {
        self.eps_start = v;
        self
    }

    /// Set the epsilon value at the final step.
    pub fn eps_final(mut self, v: f64) -> Self {
        self.eps_final = v;
        self
    }

    /// Epsilon after `step` environment steps.
    pub fn eps(&self, step: usize) -> f64 {
        if step >= self.final_step {
            self.eps_final
        } else {
            let d = (self.eps_final - self.eps_start) / self.final_step as f64;
            self.eps_start + d * step as f64
        }
    }

    /// Picks a uniformly random action with probability `eps`, the greedy one otherwise.
    pub fn action(q: ArrayView1<f32>, eps: f64, rng: &mut impl Rng) -> usize {
        if rng.gen::<f64>() < eps {
            rng.gen_range(0..q.len())
        } else {
            argmax(q)
        }
    }
}

/// Index of the largest value, the first one on ties.
pub(super) fn argmax(q: ArrayView1<f32>) -> usize {
    q.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(ib, vb), (i, &v)| {
            if v > vb {
                (i, v)
            } else {
                (ib, vb)
            }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_linear_annealing() {
        let e = EpsilonGreedy::with_final_step(100).eps_start(1.0).eps_final(0.1);
        assert_eq!(e.eps(0), 1.0);
        assert!((e.eps(50) - 0.55).abs() < 1e-12);
        assert_eq!(e.eps(100), 0.1);
        assert_eq!(e.eps(1_000_000), 0.1);
    }

    #[test]
    fn test_greedy_and_random_actions() {
        let mut rng = SmallRng::seed_from_u64(0);
        let q = arr1(&[0.5f32, 2.0, -1.0, 2.0]);
        assert_eq!(argmax(q.view()), 1);
        assert!((0..100).all(|_| EpsilonGreedy::action(q.view(), 0.0, &mut rng) == 1));

        let picks: Vec<_> = (0..400)
            .map(|_| EpsilonGreedy::action(q.view(), 1.0, &mut rng))
            .collect();
        assert!((0..4).all(|a| picks.contains(&a)));
    }
}
