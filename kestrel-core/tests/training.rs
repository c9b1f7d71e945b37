use anyhow::Result;
use kestrel_core::{
    dqn::{Dqn, DqnConfig, EpsilonGreedy},
    dummy::{DummyEnv, DummyEnvConfig, TableQ},
    record::BufferedRecorder,
    replay_buffer::ReplayStoreConfig,
    Agent, DefaultEvaluator, FrameShape, Trainer, TrainerConfig,
};
use tempdir::TempDir;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn train_dummy_env_end_to_end() -> Result<()> {
    init();
    let model_dir = TempDir::new("kestrel_training")?;
    let env_config = DummyEnvConfig {
        episode_length: 20,
        frame_skip: 2,
        ..Default::default()
    };
    let store_config = ReplayStoreConfig::default()
        .capacity(64)
        .n_stack(2)
        .frame_shape(FrameShape::new(4, 4));
    let trainer_config = TrainerConfig::default()
        .max_frames(400)
        .warmup_period(10)
        .eval_interval(50)
        .save_interval(100)
        .flush_record_interval(25)
        .model_dir(model_dir.path().to_string_lossy());
    let dqn_config = DqnConfig::default()
        .batch_size(8)
        .discount_factor(0.9)
        .target_sync_interval(20)
        .explorer(EpsilonGreedy::with_final_step(100).eps_final(0.1));

    let mut agent = Dqn::build(
        dqn_config,
        TableQ::new(vec![0.0; 3]).learning_rate(0.2),
        TableQ::new(vec![0.0; 3]),
    )?;
    let mut evaluator =
        DefaultEvaluator::<DummyEnv>::new(&env_config, 1, 2, 2)?.trainer_config(&trainer_config);
    let mut trainer = Trainer::<DummyEnv>::build(trainer_config, &env_config, &store_config)?;
    let mut recorder = BufferedRecorder::new();

    trainer.train(&mut agent, &mut recorder, &mut evaluator)?;

    // 400 frames at 2 frames per step
    assert_eq!(trainer.frames(), 400);
    assert_eq!(trainer.env_steps(), 200);
    assert_eq!(agent.env_steps(), 200);
    assert_eq!(agent.n_syncs(), 10);
    assert_eq!(trainer.episodes(), 20);
    assert_eq!(trainer.store().len(), 64);
    assert!(agent.n_opts() > 0);

    // one aggregate per 25 env steps, the final flush finds nothing left
    assert_eq!(recorder.len(), 8);
    assert!(recorder.iter().any(|r| r.get_scalar("loss").is_ok()));
    assert!(recorder.iter().any(|r| r.get_scalar("eval_reward").is_ok()));
    assert!(recorder.iter().any(|r| r.get_scalar("episode_return").is_ok()));

    assert!(model_dir.path().join("best").is_dir());
    assert!(model_dir.path().join("100").is_dir());
    assert!(model_dir.path().join("200").is_dir());
    Ok(())
}

#[test]
fn trained_parameters_can_be_reloaded() -> Result<()> {
    init();
    let dir = TempDir::new("kestrel_params")?;
    let config = DqnConfig::default().batch_size(2);
    let agent = Dqn::build(config.clone(), TableQ::new(vec![0.1, 0.2]), TableQ::new(vec![0.0; 2]))?;
    agent.save_params(dir.path())?;

    let mut other = Dqn::build(config, TableQ::new(vec![0.0; 2]), TableQ::new(vec![0.0; 2]))?;
    other.load_params(dir.path())?;
    assert_eq!(other.online().params(), agent.online().params());
    assert_eq!(other.target().params(), agent.target().params());
    Ok(())
}
