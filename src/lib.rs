#![cfg_attr(docsrs, feature(doc_cfg))]
//! # amr-reduce
//!
//! amr-reduce downsamples adaptive-mesh-refinement (AMR) simulation snapshots.
//! Every block of a FLASH-style snapshot is halved along each axis by
//! combining 2×2×2 cell octants with a statistical strategy (mean or
//! median), while the block topology and the scalar metadata are preserved.
//!
//! ## Features
//! - Oct-tree reconstruction from the compact 9-column relation encoding,
//!   with parent/child/neighbor navigation and level-order traversal
//! - Mean and median reducers with integer rounding rules, shared freely
//!   across threads
//! - A generic downsampling engine for integer and float datasets with
//!   stack-owned octant scratch
//! - Per-dataset reduction policies, including density-weighted temperature
//! - Whole-file orchestration with optional Rayon parallelism over datasets
//!
//! ## Usage
//!
//! ```no_run
//! use amr_reduce::prelude::*;
//!
//! # fn main() -> Result<(), AmrReduceError> {
//! let process = ReductionConfig::builder()
//!     .strategy(ReductionStrategy::Median)
//!     .target_directory("reduced")
//!     .build()?;
//! let report = process.reduce_batch(["sedov_hdf5_chk_0000", "sedov_hdf5_chk_0001"]);
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```
//!
//! ## Determinism
//!
//! Parallel and sequential runs produce identical output: every worker owns
//! its buffers and the single writer emits datasets in request order.

pub mod amr_error;
pub mod debug_invariants;
pub mod io;
pub mod process;
pub mod reduce;
pub mod topology;

pub use amr_error::AmrReduceError;
pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::amr_error::AmrReduceError;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::io::flash::FlashMetadata;
    pub use crate::io::{
        Attribute, AttributeValue, Dataset, DatasetData, ElementKind, ScalarTable, ScalarValue,
        Snapshot, SnapshotReader, SnapshotSink, SnapshotSource, SnapshotWriter,
    };
    pub use crate::process::{
        BatchReport, OutputBuffer, ReductionConfig, ReductionProcess, ReductionStrategy,
        ReductionSummary,
    };
    pub use crate::reduce::{
        BlockDims, CellValue, MeanReducer, MedianReducer, PolicyTable, ReducerKind,
        ReductionPolicy, StatisticalDatasetReducer, StatisticalReducer,
    };
    pub use crate::topology::{Block, BlockBuilder, BlockFace, BlockId, BlockTree, NodeType};
}
