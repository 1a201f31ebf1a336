//! Snapshot I/O collaborators.
//!
//! The reduction engine never talks to a concrete file format. It reads
//! through [`SnapshotSource`] and writes through [`SnapshotSink`]; the types
//! below are what those traits exchange. [`snapshot`] holds an in-memory
//! implementation of both, persisted by [`container`]. [`flash`] knows which
//! datasets of a FLASH plot file are metadata and how to turn them into a
//! [`BlockTree`](crate::topology::BlockTree).

pub mod container;
pub mod flash;
pub mod snapshot;

pub use snapshot::{Snapshot, SnapshotReader, SnapshotWriter};

use crate::amr_error::AmrReduceError;
use crate::topology::BlockId;
use serde::{Deserialize, Serialize};

/// Element type of a stored dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Int,
    Float,
    Double,
    Text,
    Table,
}

/// Owned dataset contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DatasetData {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Text(Vec<String>),
    Table(ScalarTable),
}

impl DatasetData {
    pub fn kind(&self) -> ElementKind {
        match self {
            DatasetData::Int(_) => ElementKind::Int,
            DatasetData::Float(_) => ElementKind::Float,
            DatasetData::Double(_) => ElementKind::Double,
            DatasetData::Text(_) => ElementKind::Text,
            DatasetData::Table(_) => ElementKind::Table,
        }
    }

    /// Number of stored elements (entries for a table).
    pub fn len(&self) -> usize {
        match self {
            DatasetData::Int(v) => v.len(),
            DatasetData::Float(v) => v.len(),
            DatasetData::Double(v) => v.len(),
            DatasetData::Text(v) => v.len(),
            DatasetData::Table(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named array: shape, data and attached attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub dims: Vec<usize>,
    pub data: DatasetData,
    pub attributes: Vec<Attribute>,
}

impl Dataset {
    /// Build a dataset, checking that `dims` describes `data.len()` elements.
    pub fn new(
        name: &str,
        data: DatasetData,
        dims: Vec<usize>,
    ) -> Result<Self, AmrReduceError> {
        check_shape(name, data.len(), &dims)?;
        Ok(Self {
            dims,
            data,
            attributes: Vec::new(),
        })
    }

    /// A scalar table, stored as a one-dimensional list of entries.
    pub fn table(table: ScalarTable) -> Self {
        Self {
            dims: vec![table.len()],
            data: DatasetData::Table(table),
            attributes: Vec::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Vec<Attribute>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn kind(&self) -> ElementKind {
        self.data.kind()
    }

    /// Extent of the first axis (the block axis for per-block data).
    pub fn rows(&self) -> usize {
        self.dims.first().copied().unwrap_or(0)
    }

    /// Elements per row.
    pub fn row_len(&self) -> usize {
        self.dims.iter().skip(1).product()
    }

    pub fn attribute(&self, name: &str) -> Option<AttributeValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value)
    }
}

/// `dims` must multiply out to `len`.
pub fn check_shape(dataset: &str, len: usize, dims: &[usize]) -> Result<(), AmrReduceError> {
    let expected: usize = dims.iter().product();
    if expected == len {
        Ok(())
    } else {
        Err(AmrReduceError::ShapeMismatch {
            dataset: dataset.to_string(),
            expected,
            found: len,
        })
    }
}

/// Scalar stored in one of the key/value metadata tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Int(i32),
    Logical(bool),
    Real(f64),
    Text(String),
}

/// Ordered key/value table (`integer scalars`, `real runtime parameters`, ...).
///
/// Key order is preserved on rewrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalarTable {
    entries: Vec<(String, ScalarValue)>,
}

impl ScalarTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ScalarValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        match self.get(key) {
            Some(ScalarValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Integer value of `key`, or [`AmrReduceError::MissingScalar`].
    pub fn require_int(&self, key: &str) -> Result<i32, AmrReduceError> {
        self.get_int(key)
            .ok_or_else(|| AmrReduceError::MissingScalar(key.to_string()))
    }

    /// Replace the value of `key` in place, or append it.
    pub fn set(&mut self, key: &str, value: ScalarValue) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Apply `f` to the integer value of `key` if present.
    pub fn update_int(&mut self, key: &str, f: impl FnOnce(i32) -> i32) {
        if let Some((_, ScalarValue::Int(v))) = self.entries.iter_mut().find(|(k, _)| k == key) {
            *v = f(*v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, ScalarValue)> for ScalarTable {
    fn from_iter<I: IntoIterator<Item = (K, ScalarValue)>>(iter: I) -> Self {
        let mut table = ScalarTable::new();
        for (k, v) in iter {
            table.set(&k.into(), v);
        }
        table
    }
}

/// Attribute attached to a written dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub const MINIMUM: &'static str = "minimum";
    pub const MAXIMUM: &'static str = "maximum";

    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Int(i32),
    Float(f32),
}

impl AttributeValue {
    pub fn as_f64(self) -> f64 {
        match self {
            AttributeValue::Int(v) => f64::from(v),
            AttributeValue::Float(v) => f64::from(v),
        }
    }
}

/// Read side of the structured-file collaborator.
///
/// Every method fails with [`AmrReduceError::ResourceClosed`] after
/// [`close`](SnapshotSource::close), with
/// [`AmrReduceError::DatasetNotFound`] for unknown names and with
/// [`AmrReduceError::UnsupportedType`] when a typed read meets another
/// element type.
pub trait SnapshotSource {
    fn dataset_names(&self) -> Result<Vec<String>, AmrReduceError>;

    fn element_kind(&self, name: &str) -> Result<ElementKind, AmrReduceError>;

    fn dataset_dims(&self, name: &str) -> Result<Vec<usize>, AmrReduceError>;

    /// The dataset exactly as stored.
    fn read_dataset(&self, name: &str) -> Result<Dataset, AmrReduceError>;

    fn read_ints(&self, name: &str) -> Result<Vec<i32>, AmrReduceError>;

    fn read_floats(&self, name: &str) -> Result<Vec<f32>, AmrReduceError>;

    /// Row `block - 1` of a per-block integer dataset.
    fn read_block_ints(&self, name: &str, block: BlockId) -> Result<Vec<i32>, AmrReduceError>;

    /// Row `block - 1` of a per-block float dataset.
    fn read_block_floats(&self, name: &str, block: BlockId)
    -> Result<Vec<f32>, AmrReduceError>;

    fn read_scalar_table(&self, name: &str) -> Result<ScalarTable, AmrReduceError>;

    fn has_dataset(&self, name: &str) -> Result<bool, AmrReduceError> {
        Ok(self.dataset_names()?.iter().any(|n| n == name))
    }

    fn is_closed(&self) -> bool;

    fn close(&mut self) -> Result<(), AmrReduceError>;
}

/// Write side of the structured-file collaborator. Single writer; every
/// method fails with [`AmrReduceError::ResourceClosed`] after
/// [`close`](SnapshotSink::close).
pub trait SnapshotSink {
    fn write_ints(
        &mut self,
        name: &str,
        data: &[i32],
        dims: &[usize],
        attributes: &[Attribute],
    ) -> Result<(), AmrReduceError>;

    fn write_floats(
        &mut self,
        name: &str,
        data: &[f32],
        dims: &[usize],
        attributes: &[Attribute],
    ) -> Result<(), AmrReduceError>;

    fn write_scalar_table(&mut self, name: &str, table: &ScalarTable)
    -> Result<(), AmrReduceError>;

    fn write_dataset(&mut self, name: &str, dataset: Dataset) -> Result<(), AmrReduceError>;

    /// Copy `name` from `source` unchanged.
    fn copy_dataset<S: SnapshotSource + ?Sized>(
        &mut self,
        source: &S,
        name: &str,
    ) -> Result<(), AmrReduceError>
    where
        Self: Sized,
    {
        let dataset = source.read_dataset(name)?;
        self.write_dataset(name, dataset)
    }

    fn is_closed(&self) -> bool;

    /// Flush and release the sink. Closing twice is a no-op.
    fn close(&mut self) -> Result<(), AmrReduceError>;
}
