//! Flattened output of one reduced dataset.

use crate::amr_error::AmrReduceError;
use crate::io::Attribute;
use crate::reduce::CellValue;

/// All reduced blocks of a dataset, back to back, with the running
/// minimum and maximum of every value written so far.
///
/// One buffer is reused for every dataset of the same element type within a
/// worker; [`reset`](OutputBuffer::reset) resizes it without reallocating
/// when the capacity suffices.
#[derive(Debug, Clone)]
pub struct OutputBuffer<T> {
    data: Vec<T>,
    block_cells: usize,
    min: T,
    max: T,
    written: usize,
}

impl<T: CellValue> Default for OutputBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CellValue> OutputBuffer<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            block_cells: 0,
            min: T::max_value(),
            max: T::min_value(),
            written: 0,
        }
    }

    /// Prepare for `blocks` blocks of `block_cells` values each.
    pub fn reset(&mut self, blocks: usize, block_cells: usize) {
        self.data.clear();
        self.data.resize(blocks * block_cells, T::zero());
        self.block_cells = block_cells;
        self.min = T::max_value();
        self.max = T::min_value();
        self.written = 0;
    }

    /// Let `fill` write block `index` in place, then fold its values into
    /// the extrema.
    pub fn fill_block<F>(&mut self, index: usize, fill: F) -> Result<(), AmrReduceError>
    where
        F: FnOnce(&mut [T]) -> Result<(), AmrReduceError>,
    {
        let start = index * self.block_cells;
        let end = start + self.block_cells;
        let slot = self
            .data
            .get_mut(start..end)
            .ok_or(AmrReduceError::UnknownBlock(index as i64 + 1))?;
        fill(slot)?;
        for &v in slot.iter() {
            if v < self.min {
                self.min = v;
            }
            if v > self.max {
                self.max = v;
            }
        }
        self.written += self.block_cells;
        Ok(())
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Smallest value written since the last reset.
    pub fn minimum(&self) -> Option<T> {
        (self.written > 0).then_some(self.min)
    }

    /// Largest value written since the last reset.
    pub fn maximum(&self) -> Option<T> {
        (self.written > 0).then_some(self.max)
    }

    /// `minimum` and `maximum` attributes, or none if nothing was written.
    pub fn attributes(&self) -> Vec<Attribute> {
        match (self.minimum(), self.maximum()) {
            (Some(min), Some(max)) => vec![
                Attribute::new(Attribute::MINIMUM, min.attribute()),
                Attribute::new(Attribute::MAXIMUM, max.attribute()),
            ],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::AttributeValue;

    #[test]
    fn tracks_extrema_across_blocks() {
        let mut buf = OutputBuffer::<i32>::new();
        buf.reset(2, 2);
        buf.fill_block(1, |s| {
            s.copy_from_slice(&[-4, 7]);
            Ok(())
        })
        .unwrap();
        buf.fill_block(0, |s| {
            s.copy_from_slice(&[3, 9]);
            Ok(())
        })
        .unwrap();
        assert_eq!(buf.as_slice(), &[3, 9, -4, 7]);
        assert_eq!(buf.minimum(), Some(-4));
        assert_eq!(buf.maximum(), Some(9));
        assert_eq!(
            buf.attributes(),
            vec![
                Attribute::new("minimum", AttributeValue::Int(-4)),
                Attribute::new("maximum", AttributeValue::Int(9)),
            ]
        );
    }

    #[test]
    fn all_negative_floats_have_a_negative_maximum() {
        let mut buf = OutputBuffer::<f32>::new();
        buf.reset(1, 3);
        buf.fill_block(0, |s| {
            s.copy_from_slice(&[-3.0, -1.5, -2.0]);
            Ok(())
        })
        .unwrap();
        assert_eq!(buf.maximum(), Some(-1.5));
        assert_eq!(buf.minimum(), Some(-3.0));
    }

    #[test]
    fn reset_clears_state() {
        let mut buf = OutputBuffer::<f32>::new();
        buf.reset(1, 1);
        buf.fill_block(0, |s| {
            s[0] = 5.0;
            Ok(())
        })
        .unwrap();
        buf.reset(3, 1);
        assert_eq!(buf.len(), 3);
        assert!(buf.attributes().is_empty());
        assert!(buf.fill_block(3, |_| Ok(())).is_err());
    }
}
