//! In-memory snapshot and its reader/writer handles.
//!
//! A [`Snapshot`] is an ordered map of named [`Dataset`]s. [`SnapshotReader`]
//! and [`SnapshotWriter`] wrap one with open/closed state so they behave like
//! file handles: after `close` every access fails with
//! [`AmrReduceError::ResourceClosed`]. A writer created for a path persists
//! its snapshot through [`container`](super::container) when it is closed,
//! never before.

use super::{
    Attribute, Dataset, DatasetData, ElementKind, ScalarTable, SnapshotSink, SnapshotSource,
    container,
};
use crate::amr_error::AmrReduceError;
use crate::topology::BlockId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Named datasets of one simulation output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    datasets: BTreeMap<String, Dataset>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a dataset, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, dataset: Dataset) -> Option<Dataset> {
        self.datasets.insert(name.into(), dataset)
    }

    pub fn with(mut self, name: impl Into<String>, dataset: Dataset) -> Self {
        self.insert(name, dataset);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Dataset> {
        self.datasets.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Dataset> {
        self.datasets.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.datasets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Dataset)> + '_ {
        self.datasets.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

/// Read handle over a [`Snapshot`].
#[derive(Debug)]
pub struct SnapshotReader {
    snapshot: Snapshot,
    path: Option<PathBuf>,
    closed: bool,
}

impl SnapshotReader {
    /// Load a snapshot container from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AmrReduceError> {
        let path = path.as_ref();
        let snapshot = container::read_snapshot(path)?;
        Ok(Self {
            snapshot,
            path: Some(path.to_path_buf()),
            closed: false,
        })
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            path: None,
            closed: false,
        }
    }

    /// File this reader was opened from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn dataset(&self, name: &str) -> Result<&Dataset, AmrReduceError> {
        if self.closed {
            return Err(AmrReduceError::ResourceClosed("source"));
        }
        self.snapshot
            .get(name)
            .ok_or_else(|| AmrReduceError::DatasetNotFound(name.to_string()))
    }

    /// Slice of row `block - 1` of a per-block dataset.
    fn block_row<'a, T>(
        &self,
        name: &str,
        dataset: &Dataset,
        values: &'a [T],
        block: BlockId,
    ) -> Result<&'a [T], AmrReduceError> {
        if block.index() >= dataset.rows() {
            return Err(AmrReduceError::UnknownBlock(i64::from(block.get())));
        }
        let row = dataset.row_len();
        let start = block.index() * row;
        values
            .get(start..start + row)
            .ok_or_else(|| AmrReduceError::ShapeMismatch {
                dataset: name.to_string(),
                expected: dataset.dims.iter().product(),
                found: values.len(),
            })
    }
}

fn unsupported(name: &str, kind: ElementKind) -> AmrReduceError {
    AmrReduceError::UnsupportedType {
        dataset: name.to_string(),
        kind,
    }
}

impl SnapshotSource for SnapshotReader {
    fn dataset_names(&self) -> Result<Vec<String>, AmrReduceError> {
        if self.closed {
            return Err(AmrReduceError::ResourceClosed("source"));
        }
        Ok(self.snapshot.names().map(str::to_string).collect())
    }

    fn element_kind(&self, name: &str) -> Result<ElementKind, AmrReduceError> {
        Ok(self.dataset(name)?.kind())
    }

    fn dataset_dims(&self, name: &str) -> Result<Vec<usize>, AmrReduceError> {
        Ok(self.dataset(name)?.dims.clone())
    }

    fn read_dataset(&self, name: &str) -> Result<Dataset, AmrReduceError> {
        self.dataset(name).cloned()
    }

    fn read_ints(&self, name: &str) -> Result<Vec<i32>, AmrReduceError> {
        match &self.dataset(name)?.data {
            DatasetData::Int(v) => Ok(v.clone()),
            other => Err(unsupported(name, other.kind())),
        }
    }

    fn read_floats(&self, name: &str) -> Result<Vec<f32>, AmrReduceError> {
        match &self.dataset(name)?.data {
            DatasetData::Float(v) => Ok(v.clone()),
            other => Err(unsupported(name, other.kind())),
        }
    }

    fn read_block_ints(&self, name: &str, block: BlockId) -> Result<Vec<i32>, AmrReduceError> {
        let dataset = self.dataset(name)?;
        match &dataset.data {
            DatasetData::Int(v) => Ok(self.block_row(name, dataset, v, block)?.to_vec()),
            other => Err(unsupported(name, other.kind())),
        }
    }

    fn read_block_floats(
        &self,
        name: &str,
        block: BlockId,
    ) -> Result<Vec<f32>, AmrReduceError> {
        let dataset = self.dataset(name)?;
        match &dataset.data {
            DatasetData::Float(v) => Ok(self.block_row(name, dataset, v, block)?.to_vec()),
            other => Err(unsupported(name, other.kind())),
        }
    }

    fn read_scalar_table(&self, name: &str) -> Result<ScalarTable, AmrReduceError> {
        match &self.dataset(name)?.data {
            DatasetData::Table(t) => Ok(t.clone()),
            other => Err(unsupported(name, other.kind())),
        }
    }

    fn has_dataset(&self, name: &str) -> Result<bool, AmrReduceError> {
        if self.closed {
            return Err(AmrReduceError::ResourceClosed("source"));
        }
        Ok(self.snapshot.get(name).is_some())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) -> Result<(), AmrReduceError> {
        self.closed = true;
        self.snapshot = Snapshot::default();
        Ok(())
    }
}

/// Write handle collecting datasets into a [`Snapshot`].
#[derive(Debug, Default)]
pub struct SnapshotWriter {
    snapshot: Snapshot,
    target: Option<PathBuf>,
    closed: bool,
}

impl SnapshotWriter {
    /// A writer that saves to `path` on [`close`](SnapshotSink::close).
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, AmrReduceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(AmrReduceError::Io(format!(
                    "directory {} does not exist",
                    parent.display()
                )));
            }
        }
        Ok(Self {
            snapshot: Snapshot::default(),
            target: Some(path.to_path_buf()),
            closed: false,
        })
    }

    /// A writer that only keeps its snapshot in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    /// Datasets written so far.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn into_snapshot(self) -> Snapshot {
        self.snapshot
    }

    fn ensure_open(&self) -> Result<(), AmrReduceError> {
        if self.closed {
            Err(AmrReduceError::ResourceClosed("sink"))
        } else {
            Ok(())
        }
    }
}

impl SnapshotSink for SnapshotWriter {
    fn write_ints(
        &mut self,
        name: &str,
        data: &[i32],
        dims: &[usize],
        attributes: &[Attribute],
    ) -> Result<(), AmrReduceError> {
        self.ensure_open()?;
        let dataset = Dataset::new(name, DatasetData::Int(data.to_vec()), dims.to_vec())?
            .with_attributes(attributes.to_vec());
        self.snapshot.insert(name, dataset);
        Ok(())
    }

    fn write_floats(
        &mut self,
        name: &str,
        data: &[f32],
        dims: &[usize],
        attributes: &[Attribute],
    ) -> Result<(), AmrReduceError> {
        self.ensure_open()?;
        let dataset = Dataset::new(name, DatasetData::Float(data.to_vec()), dims.to_vec())?
            .with_attributes(attributes.to_vec());
        self.snapshot.insert(name, dataset);
        Ok(())
    }

    fn write_scalar_table(
        &mut self,
        name: &str,
        table: &ScalarTable,
    ) -> Result<(), AmrReduceError> {
        self.ensure_open()?;
        self.snapshot.insert(name, Dataset::table(table.clone()));
        Ok(())
    }

    fn write_dataset(&mut self, name: &str, dataset: Dataset) -> Result<(), AmrReduceError> {
        self.ensure_open()?;
        self.snapshot.insert(name, dataset);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) -> Result<(), AmrReduceError> {
        if self.closed {
            return Ok(());
        }
        if let Some(path) = &self.target {
            container::write_snapshot(path, &self.snapshot)?;
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ScalarValue;

    fn bid(raw: u32) -> BlockId {
        BlockId::new(raw).unwrap()
    }

    fn reader() -> SnapshotReader {
        let snap = Snapshot::new()
            .with(
                "dens",
                Dataset::new("dens", DatasetData::Float((0..16).map(|v| v as f32).collect()), vec![2, 2, 2, 2])
                    .unwrap(),
            )
            .with(
                "integer scalars",
                Dataset::table([("nxb", ScalarValue::Int(2))].into_iter().collect()),
            );
        SnapshotReader::from_snapshot(snap)
    }

    #[test]
    fn block_rows_are_one_based() {
        let r = reader();
        assert_eq!(r.read_block_floats("dens", bid(2)).unwrap()[0], 8.0);
        assert_eq!(
            r.read_block_floats("dens", bid(3)),
            Err(AmrReduceError::UnknownBlock(3))
        );
    }

    #[test]
    fn typed_reads_check_element_kind() {
        let r = reader();
        assert_eq!(
            r.read_ints("dens"),
            Err(AmrReduceError::UnsupportedType {
                dataset: "dens".into(),
                kind: ElementKind::Float
            })
        );
        assert_eq!(r.read_scalar_table("integer scalars").unwrap().get_int("nxb"), Some(2));
        assert_eq!(
            r.read_floats("pres"),
            Err(AmrReduceError::DatasetNotFound("pres".into()))
        );
    }

    #[test]
    fn closed_reader_refuses_access() {
        let mut r = reader();
        r.close().unwrap();
        assert!(r.is_closed());
        assert_eq!(
            r.read_block_floats("dens", bid(1)),
            Err(AmrReduceError::ResourceClosed("source"))
        );
        assert_eq!(r.dataset_names(), Err(AmrReduceError::ResourceClosed("source")));
    }

    #[test]
    fn writer_copies_and_closes() {
        let r = reader();
        let mut w = SnapshotWriter::in_memory();
        w.copy_dataset(&r, "integer scalars").unwrap();
        w.write_ints("flags", &[1, 2], &[2], &[]).unwrap();
        assert!(w.write_ints("bad", &[1, 2, 3], &[2], &[]).is_err());
        w.close().unwrap();
        assert_eq!(
            w.write_floats("late", &[], &[0], &[]),
            Err(AmrReduceError::ResourceClosed("sink"))
        );
        let snap = w.into_snapshot();
        assert_eq!(snap.names().collect::<Vec<_>>(), ["flags", "integer scalars"]);
    }
}
