//! DQN agent.
use super::{DqnConfig, EpsilonGreedy, SyncScheduler, TargetComputer};
use crate::{
    error::KestrelError,
    record::{Record, RecordValue},
    replay_buffer::{BatchSampler, ReplayStore},
    Agent, Policy, QFunction,
};
use anyhow::Result;
use log::{debug, info};
use ndarray::{ArrayView3, Axis};
use rand::{rngs::SmallRng, SeedableRng};
use std::{fs, path::Path};

const QNET_FILE: &str = "qnet.params";
const QNET_TGT_FILE: &str = "qnet_tgt.params";

#[allow(clippy::upper_case_acronyms)]
/// DQN agent with a hard-synchronised target network.
pub struct Dqn<Q: QFunction> {
    online: Q,
    target: Q,
    sampler: BatchSampler,
    target_computer: TargetComputer,
    sync: SyncScheduler,
    explorer: EpsilonGreedy,
    batch_size: usize,
    eval_epsilon: f64,
    train: bool,
    env_steps: usize,
    n_opts: usize,
    n_syncs: usize,
    rng: SmallRng,
}

impl<Q: QFunction> Dqn<Q> {
    /// Constructs a DQN agent from two instances of the same Q-function.
    ///
    /// The target network is overwritten with the online parameters, so the
    /// two networks start identical whatever their initialization.
    pub fn build(config: DqnConfig, online: Q, mut target: Q) -> Result<Self> {
        config.validate()?;
        if online.n_actions() != target.n_actions() {
            return Err(KestrelError::InvalidConfig(format!(
                "online network has {} actions, target network {}",
                online.n_actions(),
                target.n_actions()
            ))
            .into());
        }
        target.restore(&online.snapshot()?)?;

        Ok(Self {
            online,
            target,
            sampler: BatchSampler::new(config.seed),
            target_computer: TargetComputer::new(config.discount_factor, config.double_dqn),
            sync: SyncScheduler::new(config.target_sync_interval),
            explorer: config.explorer,
            batch_size: config.batch_size,
            eval_epsilon: config.eval_epsilon,
            train: false,
            env_steps: 0,
            n_opts: 0,
            n_syncs: 0,
            // separate streams for acting and sampling
            rng: SmallRng::seed_from_u64(config.seed.wrapping_add(1)),
        })
    }

    /// Copies the online parameters into the target network.
    pub fn sync_target(&mut self) -> Result<()> {
        self.target.restore(&self.online.snapshot()?)?;
        self.n_syncs += 1;
        debug!(
            "Synchronized target network at env step {} (sync #{})",
            self.env_steps, self.n_syncs
        );
        Ok(())
    }

    /// Epsilon of the current mode and step.
    pub fn epsilon(&self) -> f64 {
        if self.train {
            self.explorer.eps(self.env_steps)
        } else {
            self.eval_epsilon
        }
    }

    /// The online network.
    pub fn online(&self) -> &Q {
        &self.online
    }

    /// The online network, for instance to adjust its optimizer.
    pub fn online_mut(&mut self) -> &mut Q {
        &mut self.online
    }

    /// The target network.
    pub fn target(&self) -> &Q {
        &self.target
    }

    /// Environment steps observed so far.
    pub fn env_steps(&self) -> usize {
        self.env_steps
    }

    /// Optimization steps done so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// Target syncs done so far, excluding the one at construction.
    pub fn n_syncs(&self) -> usize {
        self.n_syncs
    }
}

impl<Q: QFunction> Policy for Dqn<Q> {
    fn sample(&mut self, obs: ArrayView3<u8>) -> Result<usize> {
        let obs = obs.insert_axis(Axis(0)).to_owned();
        let q = self.online.forward(&obs)?;
        let eps = self.epsilon();
        Ok(EpsilonGreedy::action(q.row(0), eps, &mut self.rng))
    }
}

impl<Q: QFunction> Agent for Dqn<Q> {
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn n_actions(&self) -> usize {
        self.online.n_actions()
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn observe_step(&mut self) -> Result<bool> {
        self.env_steps += 1;
        if self.sync.tick() {
            self.sync_target()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn opt(&mut self, store: &ReplayStore) -> Result<Option<Record>> {
        let batch = match self.sampler.sample(store, self.batch_size)? {
            Some(batch) => batch,
            None => return Ok(None),
        };

        let targets = self
            .target_computer
            .compute(&batch, &self.online, &self.target)?;
        let loss = self.online.train_step(&batch.obs, &targets)?;
        self.n_opts += 1;

        Ok(Some(Record::from_slice(&[
            ("loss", RecordValue::Scalar(loss)),
            ("epsilon", RecordValue::Scalar(self.epsilon() as f32)),
        ])))
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.online.save(&path.join(QNET_FILE))?;
        self.target.save(&path.join(QNET_TGT_FILE))?;
        info!("Saved DQN parameters in {}", path.display());
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.online.load(&path.join(QNET_FILE))?;
        self.target.load(&path.join(QNET_TGT_FILE))?;
        info!("Loaded DQN parameters from {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dummy::TableQ, replay_buffer::ReplayStoreConfig, FrameShape};
    use ndarray::Array3;
    use tempdir::TempDir;

    fn agent(sync_interval: usize) -> Dqn<TableQ> {
        let config = DqnConfig::default()
            .batch_size(4)
            .discount_factor(0.5)
            .target_sync_interval(sync_interval);
        Dqn::build(config, TableQ::new(vec![1.0, 2.0, 3.0]), TableQ::new(vec![0.0; 3])).unwrap()
    }

    fn store(n: usize, terminal: bool) -> ReplayStore {
        let config = ReplayStoreConfig::default()
            .capacity(64)
            .n_stack(2)
            .frame_shape(FrameShape::new(1, 1));
        let mut store = ReplayStore::build(&config).unwrap();
        for i in 0..n {
            store.commit(&[i as u8], i % 3, 1.0, terminal).unwrap();
        }
        store
    }

    #[test]
    fn test_target_is_synced_at_construction() {
        let dqn = agent(10);
        assert_eq!(dqn.target().params(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_sync_every_interval_and_target_frozen_between() -> Result<()> {
        let mut dqn = agent(5);
        dqn.train();
        let store = store(20, false);
        let obs = Array3::<u8>::ones((2, 1, 1)).insert_axis(Axis(0));

        let mut synced_at = vec![];
        for step in 1..=15 {
            let before = dqn.target().forward(&obs)?;
            dqn.opt(&store)?;
            assert_eq!(dqn.target().forward(&obs)?, before);
            if dqn.observe_step()? {
                synced_at.push(step);
                assert_eq!(dqn.target().params(), dqn.online().params());
            }
        }
        assert_eq!(synced_at, vec![5, 10, 15]);
        assert_ne!(dqn.online().params(), &[1.0, 2.0, 3.0]);
        assert_eq!(dqn.n_syncs(), 3);
        Ok(())
    }

    #[test]
    fn test_underflow_skips_optimization() -> Result<()> {
        let mut dqn = agent(5);
        assert!(dqn.opt(&store(5, false))?.is_none());
        assert_eq!(dqn.n_opts(), 0);
        assert!(dqn.opt(&store(6, false))?.is_some());
        assert_eq!(dqn.n_opts(), 1);
        Ok(())
    }

    #[test]
    fn test_terminal_batches_never_query_the_target_network() -> Result<()> {
        let mut dqn = agent(1000);
        let calls = dqn.target().forward_calls();
        dqn.opt(&store(20, true))?;
        assert_eq!(dqn.target().forward_calls(), calls);

        dqn.opt(&store(20, false))?;
        assert_eq!(dqn.target().forward_calls(), calls + 1);
        Ok(())
    }

    #[test]
    fn test_eval_mode_uses_eval_epsilon() {
        let mut dqn = agent(10);
        dqn.train();
        assert_eq!(dqn.epsilon(), 1.0);
        dqn.eval();
        assert_eq!(dqn.epsilon(), 0.05);
    }

    #[test]
    fn test_save_and_load_params() -> Result<()> {
        let dir = TempDir::new("dqn_params")?;
        let dqn = agent(10);
        dqn.save_params(dir.path())?;

        let mut other = agent(10);
        other.online_mut().restore(&vec![0.0; 3])?;
        other.load_params(dir.path())?;
        assert_eq!(other.online().params(), &[1.0, 2.0, 3.0]);
        Ok(())
    }
}
