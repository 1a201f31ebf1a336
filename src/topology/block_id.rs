//! `BlockId`: a strong, zero-cost handle for AMR blocks
//!
//! Blocks in a snapshot are numbered `1..=N`. The on-disk relation and
//! neighbor tables use `-1` (or any value `<= 0`) to mean "no block", so
//! `BlockId` wraps a `NonZeroU32` and the sentinel maps to `None` instead of
//! a default block.

use crate::amr_error::AmrReduceError;
use std::{fmt, num::NonZeroU32};

/// One-based block identifier.
///
/// # Memory layout
/// `repr(transparent)` over `NonZeroU32`, so `Option<BlockId>` is the same
/// size as a `u32`.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct BlockId(NonZeroU32);

impl BlockId {
    /// Creates a `BlockId` from a raw one-based id.
    ///
    /// # Errors
    /// Returns [`AmrReduceError::UnknownBlock`] for `0`.
    #[inline]
    pub fn new(raw: u32) -> Result<Self, AmrReduceError> {
        NonZeroU32::new(raw)
            .map(BlockId)
            .ok_or(AmrReduceError::UnknownBlock(0))
    }

    /// Decodes an entry of a relation/neighbor table: anything `<= 0` is the
    /// "no block" sentinel.
    #[inline]
    pub fn from_encoded(raw: i32) -> Option<Self> {
        u32::try_from(raw).ok().and_then(NonZeroU32::new).map(BlockId)
    }

    /// Returns the one-based id.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Zero-based row of this block in per-block datasets.
    #[inline]
    pub const fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }

    /// Inverse of [`index`](Self::index).
    #[inline]
    pub fn from_index(index: usize) -> Result<Self, AmrReduceError> {
        u32::try_from(index + 1)
            .map_err(|_| AmrReduceError::UnknownBlock(index as i64 + 1))
            .and_then(Self::new)
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BlockId").field(&self.get()).finish()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}
