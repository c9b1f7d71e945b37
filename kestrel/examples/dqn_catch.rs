use anyhow::Result;
use clap::Parser;
use kestrel::catch::{CatchConfig, CatchEnv};
use kestrel_candle_agent::{opt::OptimizerConfig, util::CriticLoss, QNet, QNetConfig};
use kestrel_core::{
    dqn::{Dqn, DqnConfig, EpsilonGreedy},
    record::AggregateRecorder,
    replay_buffer::{FrameCodec, ReplayStoreConfig},
    Agent, DefaultEvaluator, Evaluator, FrameShape, Trainer, TrainerConfig,
};
use kestrel_tensorboard::TensorboardRecorder;
use serde::Serialize;
use std::path::Path;

const FRAME_SIZE: usize = 12;
const N_STACK: usize = 2;
const N_ACTIONS: usize = 3;
const N_BALLS: usize = 5;
const LR: f64 = 5e-4;
const BATCH_SIZE: usize = 32;
const DISCOUNT_FACTOR: f32 = 0.99;
const TARGET_SYNC_INTERVAL: usize = 500;
const EXPLORATION_STEPS: usize = 20_000;
const REPLAY_STORE_CAPACITY: usize = 20_000;
const WARMUP_PERIOD: usize = 1_000;
const OPT_INTERVAL: usize = 1;
const MAX_FRAMES: usize = 60_000;
const EVAL_INTERVAL: usize = 5_000;
const N_EPISODES_PER_EVAL: usize = 5;
const MODEL_DIR: &str = "./model/dqn_catch";

mod config {
    use super::*;

    #[derive(Serialize)]
    pub struct DqnCatchConfig {
        pub env_config: CatchConfig,
        pub qnet_config: QNetConfig,
        pub agent_config: DqnConfig,
        pub store_config: ReplayStoreConfig,
        pub trainer_config: TrainerConfig,
    }

    impl DqnCatchConfig {
        pub fn new(max_frames: usize, model_dir: &str, eval_interval: usize) -> Self {
            let trainer_config = TrainerConfig::default()
                .max_frames(max_frames)
                .opt_interval(OPT_INTERVAL)
                .warmup_period(WARMUP_PERIOD)
                .eval_interval(eval_interval)
                .flush_record_interval(eval_interval)
                .save_interval(eval_interval)
                .model_dir(model_dir);
            Self {
                env_config: create_env_config(),
                qnet_config: create_qnet_config(),
                agent_config: create_agent_config(),
                store_config: create_store_config(),
                trainer_config,
            }
        }
    }

    pub fn create_env_config() -> CatchConfig {
        CatchConfig {
            frame_shape: FrameShape::new(FRAME_SIZE, FRAME_SIZE),
            n_balls: N_BALLS,
            ..Default::default()
        }
    }

    pub fn create_qnet_config() -> QNetConfig {
        QNetConfig::default()
            .n_stack(N_STACK)
            .frame_shape(FrameShape::new(FRAME_SIZE, FRAME_SIZE))
            .units(vec![128, 128])
            .n_actions(N_ACTIONS)
            .opt_config(OptimizerConfig::default().learning_rate(LR))
            .critic_loss(CriticLoss::SmoothL1)
    }

    pub fn create_agent_config() -> DqnConfig {
        DqnConfig::default()
            .batch_size(BATCH_SIZE)
            .discount_factor(DISCOUNT_FACTOR)
            .target_sync_interval(TARGET_SYNC_INTERVAL)
            .explorer(EpsilonGreedy::with_final_step(EXPLORATION_STEPS).eps_final(0.05))
    }

    pub fn create_store_config() -> ReplayStoreConfig {
        ReplayStoreConfig::default()
            .capacity(REPLAY_STORE_CAPACITY)
            .n_stack(N_STACK)
            .frame_shape(FrameShape::new(FRAME_SIZE, FRAME_SIZE))
            .codec(FrameCodec::RunLength)
    }
}

use config::{create_agent_config, create_env_config, create_qnet_config, DqnCatchConfig};

fn create_agent() -> Result<Dqn<QNet>> {
    let qnet_config = create_qnet_config();
    Dqn::build(
        create_agent_config(),
        QNet::build(&qnet_config)?,
        QNet::build(&qnet_config)?,
    )
}

/// Train/eval DQN agent in the catch game
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Train DQN agent, not evaluate
    #[arg(short, long, default_value_t = false)]
    train: bool,

    /// Evaluate DQN agent, not train
    #[arg(short, long, default_value_t = false)]
    eval: bool,

    /// Number of raw frames to train for
    #[arg(long, default_value_t = MAX_FRAMES)]
    max_frames: usize,
}

fn train(max_frames: usize, model_dir: &str, eval_interval: usize) -> Result<()> {
    let config = DqnCatchConfig::new(max_frames, model_dir, eval_interval);
    let mut recorder: Box<dyn AggregateRecorder> = Box::new(TensorboardRecorder::new(model_dir));
    let mut trainer = Trainer::<CatchEnv>::build(
        config.trainer_config.clone(),
        &config.env_config,
        &config.store_config,
    )?;
    let mut agent = create_agent()?;
    let mut evaluator =
        DefaultEvaluator::<CatchEnv>::new(&config.env_config, 1, N_STACK, N_EPISODES_PER_EVAL)?
            .trainer_config(&config.trainer_config);

    trainer.train(&mut agent, recorder.as_mut(), &mut evaluator)?;

    Ok(())
}

fn eval(model_dir: &str) -> Result<()> {
    let mut agent = {
        let mut agent = create_agent()?;
        agent.load_params(Path::new(model_dir))?;
        agent.eval();
        agent
    };

    let _ = DefaultEvaluator::<CatchEnv>::new(&create_env_config(), 2, N_STACK, 5)?
        .evaluate(&mut agent)?;

    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if args.train {
        train(args.max_frames, MODEL_DIR, EVAL_INTERVAL)?;
    } else if args.eval {
        eval(&(MODEL_DIR.to_owned() + "/best"))?;
    } else {
        train(args.max_frames, MODEL_DIR, EVAL_INTERVAL)?;
        eval(&(MODEL_DIR.to_owned() + "/best"))?;
    }

    Ok(())
}
