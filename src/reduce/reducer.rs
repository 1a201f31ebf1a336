//! Statistical strategies that collapse a handful of cells into one.
//!
//! A [`StatisticalReducer`] is pure and stateless: one instance is built when
//! the configuration is read and shared (`Arc`) by every worker reducing
//! datasets of a file.

use super::cell_value::CellValue;
use crate::amr_error::AmrReduceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Cells combined into one coarse cell (a 2×2×2 octant).
pub const OCTANT: usize = 8;

/// Reduce a fixed-size array of values to a single value.
///
/// Implementations never mutate the caller's data. An empty slice reduces
/// to zero.
pub trait StatisticalReducer: Send + Sync + fmt::Debug {
    fn kind(&self) -> ReducerKind;

    /// Integer reduction; averages are rounded to the nearest integer.
    fn reduce_ints(&self, values: &[i32]) -> i32;

    /// Float reduction; averages are exact.
    fn reduce_floats(&self, values: &[f32]) -> f32;
}

/// Arithmetic mean.
#[derive(Debug, Default, Clone, Copy)]
pub struct MeanReducer;

impl StatisticalReducer for MeanReducer {
    fn kind(&self) -> ReducerKind {
        ReducerKind::Mean
    }

    fn reduce_ints(&self, values: &[i32]) -> i32 {
        mean(values)
    }

    fn reduce_floats(&self, values: &[f32]) -> f32 {
        mean(values)
    }
}

/// Median; even lengths average the two middle elements.
#[derive(Debug, Default, Clone, Copy)]
pub struct MedianReducer;

impl StatisticalReducer for MedianReducer {
    fn kind(&self) -> ReducerKind {
        ReducerKind::Median
    }

    fn reduce_ints(&self, values: &[i32]) -> i32 {
        median(values)
    }

    fn reduce_floats(&self, values: &[f32]) -> f32 {
        median(values)
    }
}

/// `sum / n`, converted back through [`CellValue::from_average`].
pub fn mean<T: CellValue>(values: &[T]) -> T {
    if values.is_empty() {
        return T::zero();
    }
    let sum: f64 = values.iter().map(|v| v.as_()).sum();
    T::from_average(sum / values.len() as f64)
}

/// Middle element of a sorted private copy of `values`.
pub fn median<T: CellValue>(values: &[T]) -> T {
    with_sorted_copy(values, |sorted| {
        let n = sorted.len();
        let mid = n / 2;
        match n {
            0 => T::zero(),
            _ if n % 2 == 1 => sorted[mid],
            _ => {
                let (lo, hi): (f64, f64) = (sorted[mid - 1].as_(), sorted[mid].as_());
                T::from_average((lo + hi) / 2.0)
            }
        }
    })
}

/// Run `f` over a sorted copy. Octant-sized inputs are copied to the stack.
fn with_sorted_copy<T: CellValue, R>(values: &[T], f: impl FnOnce(&[T]) -> R) -> R {
    if values.len() <= OCTANT {
        let mut buf = [T::zero(); OCTANT];
        let buf = &mut buf[..values.len()];
        buf.copy_from_slice(values);
        buf.sort_unstable_by(T::total_order);
        f(buf)
    } else {
        let mut buf = values.to_vec();
        buf.sort_unstable_by(T::total_order);
        f(&buf)
    }
}

/// The closed set of statistical strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReducerKind {
    Mean,
    #[default]
    Median,
}

impl ReducerKind {
    /// Construct the shared reducer instance for this strategy.
    pub fn build(self) -> Arc<dyn StatisticalReducer> {
        match self {
            ReducerKind::Mean => Arc::new(MeanReducer),
            ReducerKind::Median => Arc::new(MedianReducer),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReducerKind::Mean => "mean",
            ReducerKind::Median => "median",
        }
    }
}

impl fmt::Display for ReducerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReducerKind {
    type Err = AmrReduceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(ReducerKind::Mean),
            "median" => Ok(ReducerKind::Median),
            _ => Err(AmrReduceError::UnknownStrategy(s.to_string())),
        }
    }
}
