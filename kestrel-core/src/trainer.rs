//! Train [`Agent`].
mod config;
use crate::{
    error::KestrelError,
    record::{AggregateRecorder, Record, RecordValue::Scalar},
    replay_buffer::{ReplayStore, ReplayStoreConfig},
    ActionSet, Agent, Evaluator, FrameEnv, FrameHistory,
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::{debug, info};
use std::{
    path::Path,
    time::{Duration, SystemTime},
};

/// Stage of the interaction loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The frame window is not full yet; the default action is taken.
    Warmup,

    /// The agent picks the action from the frame window.
    Act,

    /// The transition is committed to the replay store.
    Store,

    /// An optimization step is done with a sampled batch.
    Train,

    /// The target network is overwritten with the online parameters.
    Sync,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages the training loop of a DQN agent on a [`FrameEnv`].
///
/// # Training loop
///
/// Each call of [`Trainer::train_step`] runs one environment step through
/// the phases in a fixed order:
///
/// ```mermaid
/// graph LR
///     W[Warmup]-->S[Store]
///     A[Act]-->S
///     S-->T[Train]
///     T-->Y[Sync]
///     S-->Y
///     Y-->|next step|W
///     Y-->|next step|A
/// ```
///
/// 1. `Warmup` or `Act`: while the frame window holds fewer than `n_stack` frames
///    the default action is taken, otherwise the agent samples an action from the
///    stacked frames. The action is repeated for the frame-skip of the
///    environment and the rewards are summed.
/// 2. `Store`: the frame the action was taken from is committed to the
///    [`ReplayStore`] with the action, the (clipped) reward and the termination
///    flag. An episode cut by `max_episode_length` is stored as terminal.
/// 3. `Train`: after `warmup_period` environment steps and every `opt_interval`
///    environment steps, the agent does an optimization step, which it skips
///    while the store holds too few transitions.
/// 4. `Sync`: the agent counts the environment step and copies the online
///    parameters into the target network when due.
///
/// At the end of an episode the environment and the frame window are reset.
///
/// [`Trainer::train`] repeats training steps until `max_frames` raw frames have
/// been consumed, evaluating the agent every `eval_interval` environment steps
/// and saving the best model in `(model_dir)/best` and checkpoints in
/// `(model_dir)/(env_steps)`.
pub struct Trainer<E: FrameEnv> {
    config: TrainerConfig,
    env: E,
    store: ReplayStore,
    history: FrameHistory,
    action_set: ActionSet,

    /// The current observation.
    frame: Vec<u8>,

    phase: Phase,
    env_steps: usize,
    frames: usize,
    opt_steps: usize,
    episodes: usize,
    episode_return: f32,
    episode_steps: usize,

    /// Optimization steps for computing optimization steps per second.
    opt_steps_for_ops: usize,

    /// Timer for computing for optimization steps per second.
    timer_for_ops: Duration,
}

impl<E: FrameEnv> Trainer<E> {
    /// Constructs a trainer with a fresh environment and an empty replay store.
    pub fn build(
        config: TrainerConfig,
        env_config: &E::Config,
        store_config: &ReplayStoreConfig,
    ) -> Result<Self> {
        config.validate()?;
        let env = E::build(env_config, 0)?;

        if env.frame_shape() != store_config.frame_shape {
            return Err(KestrelError::InvalidConfig(format!(
                "environment frames are {:?}, the replay store expects {:?}",
                env.frame_shape(),
                store_config.frame_shape
            ))
            .into());
        }

        let action_set = ActionSet::new(match config.use_minimal_action_set {
            true => env.minimal_action_set(),
            false => env.legal_action_set(),
        });
        action_set.get(config.default_action)?;

        let mut trainer = Self {
            store: ReplayStore::build(store_config)?,
            history: FrameHistory::new(store_config.n_stack, store_config.frame_shape),
            frame: vec![0; store_config.frame_shape.len()],
            phase: Phase::Warmup,
            env_steps: 0,
            frames: 0,
            opt_steps: 0,
            episodes: 0,
            episode_return: 0.0,
            episode_steps: 0,
            opt_steps_for_ops: 0,
            timer_for_ops: Duration::new(0, 0),
            config,
            env,
            action_set,
        };
        trainer.start_episode()?;
        Ok(trainer)
    }

    fn start_episode(&mut self) -> Result<()> {
        self.env.reset()?;
        self.history.clear();
        self.episode_return = 0.0;
        self.episode_steps = 0;
        self.observe();
        Ok(())
    }

    fn observe(&mut self) {
        self.env.observation(&mut self.frame);
        self.history.push(&self.frame);
        self.phase = match self.history.is_ready() {
            true => Phase::Act,
            false => Phase::Warmup,
        };
    }

    fn clip(&self, reward: f32) -> f32 {
        match self.config.clip_reward {
            Some(v) => reward.clamp(-v, v),
            None => reward,
        }
    }

    /// Rejects an agent whose output does not cover the action set or whose
    /// batches the replay store can never fill.
    fn check_agent<A: Agent>(&self, agent: &A) -> Result<(), KestrelError> {
        if agent.n_actions() != self.action_set.len() {
            return Err(KestrelError::InvalidConfig(format!(
                "agent has {} actions, the action set {}",
                agent.n_actions(),
                self.action_set.len()
            )));
        }
        if agent.batch_size() + 1 >= self.store.capacity() {
            return Err(KestrelError::InvalidConfig(format!(
                "batch size {} is not smaller than replay capacity {} minus one",
                agent.batch_size(),
                self.store.capacity()
            )));
        }
        Ok(())
    }

    /// Returns optimization steps per second, then reset the internal counter.
    fn opt_steps_per_sec(&mut self) -> f32 {
        let secs = self.timer_for_ops.as_secs_f32().max(f32::EPSILON);
        let osps = self.opt_steps_for_ops as f32 / secs;
        self.opt_steps_for_ops = 0;
        self.timer_for_ops = Duration::new(0, 0);
        osps
    }

    /// Performs a training step.
    ///
    /// Runs one environment step, stores its transition, performs an optimization
    /// step if one is due and lets the agent sync its target network.
    ///
    /// The second return value in the tuple is if an optimization step is done (`true`).
    /// The first step fails if the agent does not fit the action set or the
    /// replay store.
    pub fn train_step<A: Agent>(&mut self, agent: &mut A) -> Result<(Record, bool)> {
        if self.env_steps == 0 {
            self.check_agent(agent)?;
        }

        let mut record = Record::empty();

        // Warmup / Act
        let act = match self.phase {
            Phase::Act => agent.sample(self.history.stack().view())?,
            _ => self.config.default_action,
        };
        let (reward, n_frames) = self.env.step(self.action_set.get(act)?)?;
        self.frames += n_frames;
        self.episode_steps += 1;
        self.episode_return += reward;

        // Store
        self.phase = Phase::Store;
        let truncated = self.config.max_episode_length > 0
            && self.episode_steps >= self.config.max_episode_length;
        let is_terminal = self.env.is_terminal() || truncated;
        self.store
            .commit(&self.frame, act, self.clip(reward), is_terminal)?;
        self.env_steps += 1;

        // Train
        let mut is_opt = false;
        if self.env_steps >= self.config.warmup_period
            && self.env_steps % self.config.opt_interval == 0
        {
            self.phase = Phase::Train;
            let timer = SystemTime::now();
            if let Some(record_agent) = agent.opt(&self.store)? {
                self.opt_steps += 1;
                self.timer_for_ops += timer.elapsed()?;
                self.opt_steps_for_ops += 1;
                is_opt = true;
                if self.config.record_interval > 0
                    && self.opt_steps % self.config.record_interval == 0
                {
                    record = record.merge(record_agent);
                }
            }
        }

        // Sync
        if agent.observe_step()? {
            self.phase = Phase::Sync;
            record.insert("target_sync", Scalar(1.0));
        }

        if is_terminal {
            info!(
                "Episode {} finished: return {}, {} steps, {} frames in total",
                self.episodes, self.episode_return, self.episode_steps, self.frames
            );
            record.insert("episode_return", Scalar(self.episode_return));
            record.insert("episode_length", Scalar(self.episode_steps as f32));
            self.episodes += 1;
            self.start_episode()?;
        } else {
            self.observe();
        }

        Ok((record, is_opt))
    }

    fn save_model<A: Agent>(agent: &A, model_dir: &Path) {
        match agent.save_params(model_dir) {
            Ok(()) => info!("Saved the model in {:?}.", model_dir),
            Err(e) => info!("Failed to save model in {:?}: {}", model_dir, e),
        }
    }

    /// Train the agent.
    ///
    /// Fails as soon as the environment, the replay store or the agent fails;
    /// in particular a corrupt stored frame aborts the run.
    pub fn train<A, D>(
        &mut self,
        agent: &mut A,
        recorder: &mut dyn AggregateRecorder,
        evaluator: &mut D,
    ) -> Result<()>
    where
        A: Agent,
        D: Evaluator<A>,
    {
        let mut max_eval_reward = f32::MIN;
        let c = self.config.clone();
        info!(
            "Start training for {} frames with {} actions",
            c.max_frames,
            self.action_set.len()
        );
        agent.train();

        while self.frames < c.max_frames {
            let (mut record, is_opt) = self.train_step(agent)?;
            let env_steps = self.env_steps;

            if is_opt && c.record_interval > 0 && self.opt_steps % c.record_interval == 0 {
                record.insert("opt_steps_per_sec", Scalar(self.opt_steps_per_sec()));
            }

            // Evaluation
            if c.eval_interval > 0 && env_steps % c.eval_interval == 0 {
                info!("Starts evaluation of the trained model");
                agent.eval();
                let record_eval = evaluator.evaluate(agent)?;
                agent.train();
                let eval_reward = record_eval.get_scalar("eval_reward")?;
                record = record.merge(record_eval);

                // Save the best model up to the current iteration
                if eval_reward > max_eval_reward {
                    max_eval_reward = eval_reward;
                    if let Some(model_dir) = &c.model_dir {
                        Self::save_model(agent, &Path::new(model_dir).join("best"));
                    }
                }
            }

            // Save the current model
            if c.save_interval > 0 && env_steps % c.save_interval == 0 {
                if let Some(model_dir) = &c.model_dir {
                    Self::save_model(agent, &Path::new(model_dir).join(env_steps.to_string()));
                }
            }

            if !record.is_empty() {
                record.insert("env_steps", Scalar(env_steps as f32));
                record.insert("frames", Scalar(self.frames as f32));
                recorder.store(record);
            }

            // Flush records
            if c.flush_record_interval > 0 && env_steps % c.flush_record_interval == 0 {
                debug!("Flush records at env step {}", env_steps);
                recorder.flush(env_steps as _);
            }
        }

        recorder.flush(self.env_steps as _);
        info!(
            "Finished training: {} env steps, {} opt steps, {} episodes",
            self.env_steps, self.opt_steps, self.episodes
        );
        Ok(())
    }

    /// The replay store.
    pub fn store(&self) -> &ReplayStore {
        &self.store
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// The action set the agent's indices refer to.
    pub fn action_set(&self) -> &ActionSet {
        &self.action_set
    }

    /// The phase the next training step starts in, or the last phase of the
    /// previous step while it is running.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Environment steps done so far.
    pub fn env_steps(&self) -> usize {
        self.env_steps
    }

    /// Raw frames consumed so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Optimization steps done so far.
    pub fn opt_steps(&self) -> usize {
        self.opt_steps
    }

    /// Completed episodes.
    pub fn episodes(&self) -> usize {
        self.episodes
    }
}
