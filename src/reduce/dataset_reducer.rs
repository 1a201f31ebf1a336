//! The downsampling engine: halve a block's resolution along every axis.
//!
//! A block's cells arrive as a flat row-major array of length `X*Y*Z` with
//! index `x*Y*Z + y*Z + z`. Every output cell is produced from the 2×2×2
//! octant at `(x, y, z)` with `x`, `y`, `z` even, emitted in nested-loop
//! order (`x` outer, `z` inner). The octant scratch lives on the stack of
//! each call, so concurrent reductions never share a buffer.

use super::cell_value::CellValue;
use super::reducer::{OCTANT, StatisticalReducer};
use crate::amr_error::AmrReduceError;
use crate::io::SnapshotSource;
use crate::topology::{BlockId, BlockTree};
use itertools::iproduct;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Cells per block along each axis (`nxb`, `nyb`, `nzb`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockDims {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl BlockDims {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Cells in one block.
    pub const fn cells(&self) -> usize {
        self.x * self.y * self.z
    }

    /// Flat index of cell `(x, y, z)`.
    #[inline]
    pub const fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x * self.y * self.z + y * self.z + z
    }

    /// Dimensions after one reduction step.
    pub const fn halved(&self) -> Self {
        Self::new(self.x / 2, self.y / 2, self.z / 2)
    }

    /// All axes must be even and non-zero to be halved.
    pub fn ensure_reducible(&self) -> Result<(), AmrReduceError> {
        let ok = |n: usize| n > 0 && n % 2 == 0;
        if ok(self.x) && ok(self.y) && ok(self.z) {
            Ok(())
        } else {
            Err(AmrReduceError::InvalidDimensions {
                x: self.x,
                y: self.y,
                z: self.z,
            })
        }
    }
}

impl fmt::Display for BlockDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

/// Copy the octant whose lowest corner is `(x, y, z)` into `out`.
///
/// Slot order: `(x,y,z) (x+1,y,z) (x,y+1,z) (x+1,y+1,z)` followed by the
/// same four at `z+1`.
#[inline]
pub fn gather_octant<T: Copy>(
    flat: &[T],
    dims: BlockDims,
    (x, y, z): (usize, usize, usize),
    out: &mut [T; OCTANT],
) {
    for (slot, (dz, dy, dx)) in iproduct!(0..2, 0..2, 0..2).enumerate() {
        out[slot] = flat[dims.index(x + dx, y + dy, z + dz)];
    }
}

/// Octant origins in emission order.
pub fn octant_origins(dims: BlockDims) -> impl Iterator<Item = (usize, usize, usize)> {
    iproduct!(
        (0..dims.x).step_by(2),
        (0..dims.y).step_by(2),
        (0..dims.z).step_by(2)
    )
}

/// Halves per-block cell arrays with a shared [`StatisticalReducer`].
#[derive(Debug, Clone)]
pub struct StatisticalDatasetReducer {
    dims: BlockDims,
    reducer: Arc<dyn StatisticalReducer>,
}

impl StatisticalDatasetReducer {
    /// Bind the engine to the source block dimensions and a strategy.
    pub fn new(
        dims: BlockDims,
        reducer: Arc<dyn StatisticalReducer>,
    ) -> Result<Self, AmrReduceError> {
        dims.ensure_reducible()?;
        Ok(Self { dims, reducer })
    }

    pub fn dims(&self) -> BlockDims {
        self.dims
    }

    pub fn reduced_dims(&self) -> BlockDims {
        self.dims.halved()
    }

    /// Cells per block in the output.
    pub fn reduced_cells(&self) -> usize {
        self.dims.cells() / OCTANT
    }

    pub fn reducer(&self) -> &dyn StatisticalReducer {
        self.reducer.as_ref()
    }

    /// Reduce one block into a freshly allocated array.
    pub fn reduce_block<T: CellValue>(
        &self,
        block: BlockId,
        flat: &[T],
    ) -> Result<Vec<T>, AmrReduceError> {
        let mut out = vec![T::zero(); self.reduced_cells()];
        self.reduce_block_into(block, flat, &mut out)?;
        Ok(out)
    }

    /// Reduce one block into `out`, which must hold `X*Y*Z/8` cells.
    pub fn reduce_block_into<T: CellValue>(
        &self,
        block: BlockId,
        flat: &[T],
        out: &mut [T],
    ) -> Result<(), AmrReduceError> {
        self.combine_block_into(block, flat, None, out, |octant, _| {
            T::reduce_with(self.reducer(), octant)
        })
    }

    /// Octant-wise combination of a block with an optional second dataset of
    /// the same block. `combine` receives both octants (the auxiliary one is
    /// all zeros when absent).
    pub fn combine_block_into<T, F>(
        &self,
        block: BlockId,
        primary: &[T],
        auxiliary: Option<&[T]>,
        out: &mut [T],
        mut combine: F,
    ) -> Result<(), AmrReduceError>
    where
        T: CellValue,
        F: FnMut(&[T; OCTANT], &[T; OCTANT]) -> T,
    {
        self.expect_cells(block, primary.len(), self.dims.cells())?;
        if let Some(aux) = auxiliary {
            self.expect_cells(block, aux.len(), self.dims.cells())?;
        }
        self.expect_cells(block, out.len(), self.reduced_cells())?;

        let mut octant = [T::zero(); OCTANT];
        let mut aux_octant = [T::zero(); OCTANT];
        for (cell, origin) in out.iter_mut().zip(octant_origins(self.dims)) {
            gather_octant(primary, self.dims, origin, &mut octant);
            if let Some(aux) = auxiliary {
                gather_octant(aux, self.dims, origin, &mut aux_octant);
            }
            *cell = combine(&octant, &aux_octant);
        }
        Ok(())
    }

    /// Reduce `dataset` for every block of `tree`, in id order.
    ///
    /// Entry `i` of the result belongs to block `i + 1`.
    pub fn reduce_dataset<T, S>(
        &self,
        source: &S,
        tree: &BlockTree,
        dataset: &str,
    ) -> Result<Vec<Vec<T>>, AmrReduceError>
    where
        T: CellValue,
        S: SnapshotSource + ?Sized,
    {
        tree.blocks()
            .iter()
            .map(|block| {
                let flat = T::read_block(source, dataset, block.id())?;
                self.reduce_block(block.id(), &flat)
            })
            .collect()
    }

    fn expect_cells(
        &self,
        block: BlockId,
        found: usize,
        expected: usize,
    ) -> Result<(), AmrReduceError> {
        if found == expected {
            Ok(())
        } else {
            Err(AmrReduceError::BlockLengthMismatch {
                block: block.get(),
                expected,
                found,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduce::reducer::ReducerKind;

    fn bid(raw: u32) -> BlockId {
        BlockId::new(raw).unwrap()
    }

    fn engine(kind: ReducerKind, dims: BlockDims) -> StatisticalDatasetReducer {
        StatisticalDatasetReducer::new(dims, kind.build()).unwrap()
    }

    #[test]
    fn rejects_odd_dimensions() {
        let err = StatisticalDatasetReducer::new(BlockDims::new(4, 3, 4), ReducerKind::Mean.build())
            .unwrap_err();
        assert_eq!(err, AmrReduceError::InvalidDimensions { x: 4, y: 3, z: 4 });
        assert!(BlockDims::new(0, 2, 2).ensure_reducible().is_err());
    }

    #[test]
    fn octant_slots_follow_documented_order() {
        let dims = BlockDims::new(2, 2, 2);
        let flat: Vec<i32> = (0..8).collect();
        let mut out = [0; OCTANT];
        gather_octant(&flat, dims, (0, 0, 0), &mut out);
        let expected = [
            dims.index(0, 0, 0),
            dims.index(1, 0, 0),
            dims.index(0, 1, 0),
            dims.index(1, 1, 0),
            dims.index(0, 0, 1),
            dims.index(1, 0, 1),
            dims.index(0, 1, 1),
            dims.index(1, 1, 1),
        ]
        .map(|i| i as i32);
        assert_eq!(out, expected);
    }

    #[test]
    fn emission_order_is_x_outer_z_inner() {
        let dims = BlockDims::new(4, 4, 4);
        let origins: Vec<_> = octant_origins(dims).take(3).collect();
        assert_eq!(origins, vec![(0, 0, 0), (0, 0, 2), (0, 2, 0)]);
        assert_eq!(octant_origins(dims).count(), 8);
    }

    #[test]
    fn reduces_each_octant_to_its_mean() {
        // value = x so every octant averages x and x+1
        let dims = BlockDims::new(4, 2, 2);
        let mut flat = vec![0.0f32; dims.cells()];
        for x in 0..4 {
            for y in 0..2 {
                for z in 0..2 {
                    flat[dims.index(x, y, z)] = x as f32;
                }
            }
        }
        let out = engine(ReducerKind::Mean, dims)
            .reduce_block(bid(1), &flat)
            .unwrap();
        assert_eq!(out, vec![0.5, 2.5]);
    }

    #[test]
    fn integer_path_matches_float_path_structure() {
        let dims = BlockDims::new(4, 4, 2);
        let ints: Vec<i32> = (0..dims.cells() as i32).collect();
        let floats: Vec<f32> = ints.iter().map(|&v| v as f32).collect();
        let e = engine(ReducerKind::Median, dims);
        let ri = e.reduce_block(bid(1), &ints).unwrap();
        let rf = e.reduce_block(bid(1), &floats).unwrap();
        assert_eq!(ri.len(), 4);
        for (i, f) in ri.iter().zip(&rf) {
            assert!((*i as f32 - f).abs() <= 0.5);
        }
    }

    #[test]
    fn wrong_block_length_is_reported() {
        let e = engine(ReducerKind::Mean, BlockDims::new(2, 2, 2));
        let err = e.reduce_block(bid(3), &[1i32; 7]).unwrap_err();
        assert_eq!(
            err,
            AmrReduceError::BlockLengthMismatch {
                block: 3,
                expected: 8,
                found: 7
            }
        );
    }

    #[test]
    fn combine_sees_both_octants() {
        let e = engine(ReducerKind::Mean, BlockDims::new(2, 2, 2));
        let a = [1.0f32; 8];
        let b = [2.0f32; 8];
        let mut out = [0.0f32; 1];
        e.combine_block_into(bid(1), &a, Some(&b[..]), &mut out, |p, q| {
            p.iter().sum::<f32>() + q.iter().sum::<f32>()
        })
        .unwrap();
        assert_eq!(out, [24.0]);
    }
}
