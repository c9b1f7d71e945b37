use anyhow::Result;
use kestrel_core::{
    dqn::TargetComputer,
    dummy::TableQ,
    replay_buffer::{BatchSampler, FrameCodec, ReplayStore, ReplayStoreConfig, StackBuilder},
    FrameShape, QFunction,
};
use ndarray::Axis;

fn frame(v: u8) -> Vec<u8> {
    vec![v; 9]
}

fn store(capacity: usize, n_stack: usize, codec: FrameCodec) -> ReplayStore {
    let config = ReplayStoreConfig::default()
        .capacity(capacity)
        .n_stack(n_stack)
        .frame_shape(FrameShape::new(3, 3))
        .codec(codec);
    ReplayStore::build(&config).unwrap()
}

#[test]
fn stack_after_wrap_keeps_surviving_predecessor() -> Result<()> {
    // f0..f6 into 5 slots: [f5, f6, f2, f3, f4]
    for codec in [FrameCodec::Png, FrameCodec::RunLength, FrameCodec::Raw] {
        let mut store = store(5, 2, codec);
        for i in 0..7u8 {
            store.commit(&frame(10 + i), 0, 0.0, false)?;
        }
        assert_eq!(store.len(), 5);
        assert_eq!(store.cur_pos(), 2);

        let stack = StackBuilder::new(&store).build(0)?;
        assert_eq!(stack.obs.index_axis(Axis(0), 0), ndarray::Array2::from_elem((3, 3), 14u8));
        assert_eq!(stack.obs.index_axis(Axis(0), 1), ndarray::Array2::from_elem((3, 3), 15u8));

        let next = stack.next_obs.unwrap();
        assert_eq!(next[[0, 0, 0]], 15);
        assert_eq!(next[[1, 0, 0]], 16);

        // the oldest survivor f2 has no predecessor left
        let stack = StackBuilder::new(&store).build(2)?;
        assert_eq!(stack.obs[[0, 1, 1]], 0);
        assert_eq!(stack.obs[[1, 1, 1]], 12);
    }
    Ok(())
}

#[test]
fn terminal_samples_never_bootstrap() -> Result<()> {
    let mut store = store(50, 3, FrameCodec::RunLength);
    for i in 0..120u32 {
        store.commit(&frame((i % 200) as u8 + 1), (i % 3) as usize, 1.0, i % 3 == 2)?;
    }

    let mut sampler = BatchSampler::new(7);
    let tc = TargetComputer::new(0.9, false);
    let online = TableQ::new(vec![0.5, -0.5, 0.0]);
    let target = TableQ::new(vec![2.0, 3.0, 1.0]);

    for _ in 0..50 {
        let batch = sampler.sample(&store, 16)?.unwrap();
        let n_live = batch.is_terminal.iter().filter(|t| !**t).count();
        assert_eq!(batch.next_rows.len(), n_live);
        assert_eq!(batch.next_obs.shape()[0], n_live);
        assert!(batch.next_rows.iter().all(|&i| !batch.is_terminal[i]));

        let q = online.forward(&batch.obs)?;
        let q_next = target.forward(&batch.next_obs)?;
        let t = tc.compute(&batch, &online, &target)?;

        let mut j = 0;
        for i in 0..batch.len() {
            let a = batch.act[i];
            for b in 0..3 {
                if b != a {
                    assert_eq!(t[[i, b]], q[[i, b]]);
                }
            }
            if batch.is_terminal[i] {
                assert_eq!(t[[i, a]], batch.reward[i]);
            } else {
                let m = q_next.row(j).fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                assert_eq!(t[[i, a]], batch.reward[i] + 0.9 * m);
                j += 1;
            }
        }
    }
    Ok(())
}

#[test]
fn all_terminal_batch_skips_target_network() -> Result<()> {
    let mut store = store(40, 2, FrameCodec::Raw);
    for i in 0..40u8 {
        store.commit(&frame(i), 0, -1.0, true)?;
    }

    let batch = BatchSampler::new(0).sample(&store, 8)?.unwrap();
    let online = TableQ::new(vec![0.0, 0.0]);
    let target = TableQ::new(vec![0.0, 0.0]);
    let t = TargetComputer::new(0.99, true).compute(&batch, &online, &target)?;

    assert_eq!(target.forward_calls(), 0);
    assert_eq!(online.forward_calls(), 1);
    assert!(t.column(0).iter().all(|&v| v == -1.0));
    Ok(())
}
