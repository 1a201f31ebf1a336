#![allow(dead_code)]
use amr_reduce::io::flash::{
    BFLAGS, COORDINATES, GID, GID_COLUMNS, GLOBAL_NUM_BLOCKS, INTEGER_SCALARS, NXB, NYB, NZB,
    REAL_SCALARS,
};
use amr_reduce::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

pub fn bid(raw: u32) -> BlockId {
    BlockId::new(raw).unwrap()
}

/// One root (id 1) with eight leaf children (ids 2..=9).
pub fn nine_block_relations() -> Vec<i32> {
    let mut rel = vec![-1, 2, 3, 4, 5, 6, 7, 8, 9];
    for _ in 0..8 {
        rel.extend_from_slice(&[1, -1, -1, -1, -1, -1, -1, -1, -1]);
    }
    rel
}

/// Random oct-tree: starting from a single root, refine a random leaf
/// `refinements` times. Children get the next free ids.
pub fn random_relations(seed: u64, refinements: usize) -> Vec<i32> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut parents = vec![-1i32];
    let mut children: Vec<Option<[i32; 8]>> = vec![None];
    for _ in 0..refinements {
        let leaves: Vec<usize> = (0..parents.len())
            .filter(|&i| children[i].is_none())
            .collect();
        let pick = leaves[rng.gen_range(0..leaves.len())];
        let first = parents.len() as i32 + 1;
        children[pick] = Some(std::array::from_fn(|k| first + k as i32));
        for _ in 0..8 {
            parents.push(pick as i32 + 1);
            children.push(None);
        }
    }
    parents
        .iter()
        .zip(&children)
        .flat_map(|(&p, kids)| {
            let mut row = vec![p];
            row.extend_from_slice(&kids.unwrap_or([-1; 8]));
            row
        })
        .collect()
}

/// Synthetic FLASH snapshot around a relation array.
#[derive(Debug, Clone)]
pub struct FlashSnapshot {
    blocks: usize,
    dims: BlockDims,
    snapshot: Snapshot,
}

impl FlashSnapshot {
    pub fn new(relations: &[i32], dims: BlockDims) -> Self {
        let blocks = relations.len() / 9;
        let scalars: ScalarTable = [
            ("nprocs", ScalarValue::Int(4)),
            (NXB, ScalarValue::Int(dims.x as i32)),
            (NYB, ScalarValue::Int(dims.y as i32)),
            (NZB, ScalarValue::Int(dims.z as i32)),
            (GLOBAL_NUM_BLOCKS, ScalarValue::Int(blocks as i32)),
        ]
        .into_iter()
        .collect();
        let real: ScalarTable = [("time", ScalarValue::Real(0.25))].into_iter().collect();

        let gid: Vec<i32> = relations
            .chunks(9)
            .flat_map(|rel| {
                let mut row = vec![-1; GID_COLUMNS - 9];
                row.extend_from_slice(rel);
                row
            })
            .collect();
        let coords: Vec<f32> = (0..blocks * 3).map(|v| v as f32 * 0.5).collect();

        let snapshot = Snapshot::new()
            .with(INTEGER_SCALARS, Dataset::table(scalars))
            .with(REAL_SCALARS, Dataset::table(real))
            .with(
                GID,
                Dataset::new(GID, DatasetData::Int(gid), vec![blocks, GID_COLUMNS]).unwrap(),
            )
            .with(
                COORDINATES,
                Dataset::new(COORDINATES, DatasetData::Float(coords), vec![blocks, 3]).unwrap(),
            )
            .with(
                BFLAGS,
                Dataset::new(BFLAGS, DatasetData::Int(vec![0; blocks]), vec![blocks, 1]).unwrap(),
            );
        Self {
            blocks,
            dims,
            snapshot,
        }
    }

    pub fn blocks(&self) -> usize {
        self.blocks
    }

    pub fn dims(&self) -> BlockDims {
        self.dims
    }

    fn cell_values<T>(&self, f: impl Fn(usize, usize, usize, usize) -> T) -> Vec<T> {
        let d = self.dims;
        let mut data = Vec::with_capacity(self.blocks * d.cells());
        for b in 0..self.blocks {
            for x in 0..d.x {
                for y in 0..d.y {
                    for z in 0..d.z {
                        data.push(f(b, x, y, z));
                    }
                }
            }
        }
        data
    }

    fn var_dims(&self) -> Vec<usize> {
        vec![self.blocks, self.dims.x, self.dims.y, self.dims.z]
    }

    /// Float variable; `f(block_index, x, y, z)`.
    pub fn float_var(mut self, name: &str, f: impl Fn(usize, usize, usize, usize) -> f32) -> Self {
        let data = DatasetData::Float(self.cell_values(f));
        let dims = self.var_dims();
        self.snapshot
            .insert(name, Dataset::new(name, data, dims).unwrap());
        self
    }

    /// Integer variable; `f(block_index, x, y, z)`.
    pub fn int_var(mut self, name: &str, f: impl Fn(usize, usize, usize, usize) -> i32) -> Self {
        let data = DatasetData::Int(self.cell_values(f));
        let dims = self.var_dims();
        self.snapshot
            .insert(name, Dataset::new(name, data, dims).unwrap());
        self
    }

    pub fn with_dataset(mut self, name: &str, dataset: Dataset) -> Self {
        self.snapshot.insert(name, dataset);
        self
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader::from_snapshot(self.snapshot.clone())
    }
}

/// Nine blocks of 4×4×4 cells with a float `dens`, a float `temp` and an
/// integer `flag` variable.
pub fn sample_snapshot() -> FlashSnapshot {
    FlashSnapshot::new(&nine_block_relations(), BlockDims::new(4, 4, 4))
        .float_var("dens", |b, x, y, z| 1.0 + b as f32 + (x + y + z) as f32 * 0.125)
        .float_var("temp", |b, x, _, _| 100.0 * (b + 1) as f32 + x as f32)
        .int_var("flag", |b, x, y, z| (b * 64 + x * 16 + y * 4 + z) as i32)
}

/// A process writing into `dir`.
pub fn process(dir: &std::path::Path, strategy: ReductionStrategy) -> ReductionProcess {
    ReductionConfig::builder()
        .strategy(strategy)
        .target_directory(dir)
        .build()
        .unwrap()
}

pub fn floats(snapshot: &Snapshot, name: &str) -> Vec<f32> {
    match &snapshot.get(name).unwrap().data {
        DatasetData::Float(v) => v.clone(),
        other => panic!("{name} is {:?}", other.kind()),
    }
}

pub fn ints(snapshot: &Snapshot, name: &str) -> Vec<i32> {
    match &snapshot.get(name).unwrap().data {
        DatasetData::Int(v) => v.clone(),
        other => panic!("{name} is {:?}", other.kind()),
    }
}
