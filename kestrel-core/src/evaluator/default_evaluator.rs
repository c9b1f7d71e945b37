//! Default implementation of the [`Evaluator`] trait.
use super::Evaluator;
use crate::{
    record::{Record, RecordValue::Scalar},
    ActionSet, FrameEnv, FrameHistory, Policy, TrainerConfig,
};
use anyhow::Result;
use log::info;
use std::time::SystemTime;

/// Runs a fixed number of episodes and averages their returns.
///
/// Each episode starts with the default action until the frame window is
/// full, then follows the policy. An episode is cut after
/// `max_episode_length` visible steps.
pub struct DefaultEvaluator<E: FrameEnv> {
    n_episodes: usize,
    max_episode_length: usize,
    default_action: usize,
    action_set: ActionSet,
    history: FrameHistory,
    env: E,
}

impl<E: FrameEnv> DefaultEvaluator<E> {
    /// Constructs an evaluator using the minimal action set and default action 0.
    ///
    /// An evaluator for an agent trained with other settings must be aligned
    /// with [`DefaultEvaluator::trainer_config`], otherwise the action indices
    /// of the agent map to different environment actions.
    ///
    /// * `config` - Configuration for the environment
    /// * `seed` - Random seed for environment initialization
    /// * `n_stack` - Number of frames in an observation stack
    /// * `n_episodes` - Number of episodes to run during evaluation
    pub fn new(config: &E::Config, seed: i64, n_stack: usize, n_episodes: usize) -> Result<Self> {
        let env = E::build(config, seed)?;
        Ok(Self {
            n_episodes,
            max_episode_length: usize::MAX,
            default_action: 0,
            action_set: ActionSet::new(env.minimal_action_set()),
            history: FrameHistory::new(n_stack, env.frame_shape()),
            env,
        })
    }

    /// Sets the cap on visible steps per episode.
    pub fn max_episode_length(mut self, v: usize) -> Self {
        self.max_episode_length = v;
        self
    }

    /// Sets the action index used while the frame window fills up.
    pub fn default_action(mut self, v: usize) -> Self {
        self.default_action = v;
        self
    }

    /// Uses the legal instead of the minimal action set.
    pub fn use_legal_action_set(mut self) -> Self {
        self.action_set = ActionSet::new(self.env.legal_action_set());
        self
    }

    /// Takes the action set, the default action and the episode length cap
    /// from the configuration of the trainer.
    pub fn trainer_config(mut self, config: &TrainerConfig) -> Self {
        self.action_set = ActionSet::new(match config.use_minimal_action_set {
            true => self.env.minimal_action_set(),
            false => self.env.legal_action_set(),
        });
        self.default_action = config.default_action;
        if config.max_episode_length > 0 {
            self.max_episode_length = config.max_episode_length;
        }
        self
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Runs a single episode, returns its return, steps and raw frames.
    fn run_episode<P: Policy>(&mut self, policy: &mut P) -> Result<(f32, usize, usize)> {
        let mut frame = vec![0u8; self.env.frame_shape().len()];
        let mut episode_return = 0.0;
        let mut steps = 0;
        let mut frames = 0;

        self.env.reset()?;
        self.history.clear();

        while !self.env.is_terminal() && steps < self.max_episode_length {
            self.env.observation(&mut frame);
            self.history.push(&frame);
            let a = match self.history.is_ready() {
                true => policy.sample(self.history.stack().view())?,
                false => self.default_action,
            };
            let (r, n) = self.env.step(self.action_set.get(a)?)?;
            episode_return += r;
            steps += 1;
            frames += n;
        }

        Ok((episode_return, steps, frames))
    }
}

impl<E: FrameEnv, P: Policy> Evaluator<P> for DefaultEvaluator<E> {
    fn evaluate(&mut self, policy: &mut P) -> Result<Record> {
        let mut r_total = 0f32;
        let mut steps_total = 0;

        for ix in 0..self.n_episodes {
            let timer = SystemTime::now();
            let (r, steps, frames) = self.run_episode(policy)?;
            let secs = timer.elapsed()?.as_secs_f32();
            info!(
                "Evaluation episode {}: {} points, {} steps, {} frames, {:.1} fps",
                ix,
                r,
                steps,
                frames,
                frames as f32 / secs.max(f32::EPSILON)
            );
            r_total += r;
            steps_total += steps;
        }

        let n = self.n_episodes.max(1) as f32;
        info!("Average evaluation return: {}", r_total / n);
        Ok(Record::from_slice(&[
            ("eval_reward", Scalar(r_total / n)),
            ("eval_episode_length", Scalar(steps_total as f32 / n)),
        ]))
    }
}
