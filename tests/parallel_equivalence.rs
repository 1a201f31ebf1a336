#[cfg(feature = "rayon")]
mod util;

#[cfg(feature = "rayon")]
use amr_reduce::prelude::*;
#[cfg(feature = "rayon")]
use rand::rngs::SmallRng;
#[cfg(feature = "rayon")]
use rand::{Rng, SeedableRng};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[cfg(feature = "rayon")]
fn noisy_snapshot(seed: u64) -> util::FlashSnapshot {
    let relations = util::random_relations(seed, 6);
    let mut snap = util::FlashSnapshot::new(&relations, BlockDims::new(8, 8, 4));
    for v in 0..6 {
        let mut rng = SmallRng::seed_from_u64(seed ^ v);
        let noise: Vec<f32> = (0..snap.blocks() * 256).map(|_| rng.gen_range(-1.0..1.0)).collect();
        snap = snap.float_var(&format!("var{v}"), |b, x, y, z| noise[b * 256 + x * 32 + y * 4 + z]);
    }
    snap.int_var("dens_int", |b, x, y, z| ((b * 31 + x * 7 + y * 3 + z) % 17) as i32)
        .float_var("dens", |b, _, _, z| 1.0 + (b + z) as f32)
        .float_var("temp", |_, x, y, _| (x * y) as f32)
}

#[cfg(feature = "rayon")]
fn reduce(snap: &util::FlashSnapshot, strategy: ReductionStrategy, parallel: bool) -> Snapshot {
    let dir = tempfile::TempDir::new().unwrap();
    let process = ReductionConfig::builder()
        .target_directory(dir.path())
        .strategy(strategy)
        .parallel(parallel)
        .build()
        .unwrap();
    let mut sink = SnapshotWriter::in_memory();
    process.reduce_snapshot(&snap.reader(), &mut sink).unwrap();
    sink.into_snapshot()
}

#[cfg(feature = "rayon")]
#[test]
fn parallel_reduction_matches_serial() {
    for strategy in ReductionStrategy::ALL {
        let snap = noisy_snapshot(11);
        let serial = reduce(&snap, strategy, false);
        let parallel = reduce(&snap, strategy, true);
        assert_eq!(serial, parallel, "{strategy}");
    }
}

#[cfg(feature = "rayon")]
#[test]
fn concurrent_block_reductions_share_one_engine() {
    let snap = noisy_snapshot(5);
    let source = snap.reader();
    let meta = FlashMetadata::read(&source).unwrap();
    let engine =
        StatisticalDatasetReducer::new(meta.dims(), ReducerKind::Median.build()).unwrap();
    let names: Vec<String> = (0..6).map(|v| format!("var{v}")).collect();

    let serial: Vec<Vec<Vec<f32>>> = names
        .iter()
        .map(|n| engine.reduce_dataset(&source, meta.tree(), n).unwrap())
        .collect();
    let parallel: Vec<Vec<Vec<f32>>> = names
        .par_iter()
        .map(|n| engine.reduce_dataset(&source, meta.tree(), n).unwrap())
        .collect();
    assert_eq!(serial, parallel);
}
