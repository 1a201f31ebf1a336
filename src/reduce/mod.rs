//! Statistical downsampling of per-block cell arrays.
//!
//! - [`reducer`]: strategies collapsing an octant into one value
//! - [`dataset_reducer`]: the engine halving a block along every axis
//! - [`policy`]: per-dataset choice between plain and composite reduction
//! - [`cell_value`]: the integer/float element types shared by all of them

pub mod cell_value;
pub mod dataset_reducer;
pub mod policy;
pub mod reducer;

pub use cell_value::CellValue;
pub use dataset_reducer::{BlockDims, StatisticalDatasetReducer, gather_octant, octant_origins};
pub use policy::{CombineFn, PolicyTable, ReductionPolicy, density_weighted_mean};
pub use reducer::{MeanReducer, MedianReducer, OCTANT, ReducerKind, StatisticalReducer, mean, median};
