//! Block topology of an AMR snapshot.
//!
//! This module provides:
//! - [`BlockId`], a one-based block handle with sentinel decoding
//! - [`Block`] and its face neighbors ([`BlockFace`])
//! - [`BlockTree`], the oct-tree rebuilt from the relation encoding
//!
//! Everything here is built once per input file and is read-only afterwards.

pub mod block;
pub mod block_id;
pub mod block_tree;

pub use block::{Block, BlockBuilder, BlockFace, NEIGHBOR_COUNT, NodeType};
pub use block_id::BlockId;
pub use block_tree::{BlockTree, CHILD_COUNT, RELATION_STRIDE};
