//! Element types a variable dataset can be reduced in.
//!
//! Integer and float datasets run through the exact same octant-gathering
//! and flattening code; `CellValue` supplies the few places where they
//! differ: rounding of averages, ordering, and which collaborator method
//! reads or writes them.

use super::reducer::StatisticalReducer;
use crate::amr_error::AmrReduceError;
use crate::io::{Attribute, AttributeValue, ElementKind, SnapshotSink, SnapshotSource};
use crate::topology::BlockId;
use num_traits::{AsPrimitive, Bounded, Zero};
use std::cmp::Ordering;
use std::fmt::Debug;

/// A numeric cell type (`i32` or `f32`).
pub trait CellValue:
    Copy + Send + Sync + PartialOrd + Debug + Bounded + Zero + AsPrimitive<f64> + 'static
{
    /// Element kind as stored by the collaborator.
    const KIND: ElementKind;

    /// Convert an average back into the cell type. Integers round to the
    /// nearest value (halves away from zero), floats are narrowed.
    fn from_average(avg: f64) -> Self;

    /// Total order used for sorting. Floats follow `f32::total_cmp`: positive
    /// NaN sorts last, negative NaN first.
    fn total_order(a: &Self, b: &Self) -> Ordering;

    /// Dispatch to the type-appropriate method of the reducer.
    fn reduce_with(reducer: &dyn StatisticalReducer, values: &[Self]) -> Self;

    fn attribute(self) -> AttributeValue;

    fn read_block<S: SnapshotSource + ?Sized>(
        source: &S,
        dataset: &str,
        block: BlockId,
    ) -> Result<Vec<Self>, AmrReduceError>;

    fn write_flat<W: SnapshotSink + ?Sized>(
        sink: &mut W,
        dataset: &str,
        data: &[Self],
        dims: &[usize],
        attributes: &[Attribute],
    ) -> Result<(), AmrReduceError>;
}

impl CellValue for i32 {
    const KIND: ElementKind = ElementKind::Int;

    #[inline]
    fn from_average(avg: f64) -> Self {
        avg.round() as i32
    }

    #[inline]
    fn total_order(a: &Self, b: &Self) -> Ordering {
        a.cmp(b)
    }

    #[inline]
    fn reduce_with(reducer: &dyn StatisticalReducer, values: &[Self]) -> Self {
        reducer.reduce_ints(values)
    }

    fn attribute(self) -> AttributeValue {
        AttributeValue::Int(self)
    }

    fn read_block<S: SnapshotSource + ?Sized>(
        source: &S,
        dataset: &str,
        block: BlockId,
    ) -> Result<Vec<Self>, AmrReduceError> {
        source.read_block_ints(dataset, block)
    }

    fn write_flat<W: SnapshotSink + ?Sized>(
        sink: &mut W,
        dataset: &str,
        data: &[Self],
        dims: &[usize],
        attributes: &[Attribute],
    ) -> Result<(), AmrReduceError> {
        sink.write_ints(dataset, data, dims, attributes)
    }
}

impl CellValue for f32 {
    const KIND: ElementKind = ElementKind::Float;

    #[inline]
    fn from_average(avg: f64) -> Self {
        avg as f32
    }

    #[inline]
    fn total_order(a: &Self, b: &Self) -> Ordering {
        a.total_cmp(b)
    }

    #[inline]
    fn reduce_with(reducer: &dyn StatisticalReducer, values: &[Self]) -> Self {
        reducer.reduce_floats(values)
    }

    fn attribute(self) -> AttributeValue {
        AttributeValue::Float(self)
    }

    fn read_block<S: SnapshotSource + ?Sized>(
        source: &S,
        dataset: &str,
        block: BlockId,
    ) -> Result<Vec<Self>, AmrReduceError> {
        source.read_block_floats(dataset, block)
    }

    fn write_flat<W: SnapshotSink + ?Sized>(
        sink: &mut W,
        dataset: &str,
        data: &[Self],
        dims: &[usize],
        attributes: &[Attribute],
    ) -> Result<(), AmrReduceError> {
        sink.write_floats(dataset, data, dims, attributes)
    }
}
