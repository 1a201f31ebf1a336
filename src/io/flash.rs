//! FLASH plot-file metadata.
//!
//! A FLASH snapshot stores a fixed set of metadata datasets next to the
//! per-cell physical variables. This module names the metadata, reads the
//! per-block tables into [`Block`]s and rebuilds the [`BlockTree`] from the
//! `gid` table.

use super::{ScalarTable, SnapshotSource};
use crate::amr_error::AmrReduceError;
use crate::debug_invariants::DebugInvariants;
use crate::reduce::BlockDims;
use crate::topology::{Block, BlockId, BlockTree, NEIGHBOR_COUNT, NodeType, RELATION_STRIDE};

pub const BFLAGS: &str = "bflags";
pub const BLOCK_SIZE: &str = "block size";
pub const BOUNDING_BOX: &str = "bounding box";
pub const COORDINATES: &str = "coordinates";
pub const GID: &str = "gid";
pub const INTEGER_RUNTIME_PARAMETERS: &str = "integer runtime parameters";
pub const INTEGER_SCALARS: &str = "integer scalars";
pub const LOGICAL_RUNTIME_PARAMETERS: &str = "logical runtime parameters";
pub const LOGICAL_SCALARS: &str = "logical scalars";
pub const NODE_TYPE: &str = "node type";
pub const REAL_RUNTIME_PARAMETERS: &str = "real runtime parameters";
pub const REAL_SCALARS: &str = "real scalars";
pub const REFINE_LEVEL: &str = "refine level";
pub const STRING_RUNTIME_PARAMETERS: &str = "string runtime parameters";
pub const STRING_SCALARS: &str = "string scalars";
pub const WHICH_CHILD: &str = "which child";

/// Every well-known metadata dataset.
pub const METADATA_DATASETS: [&str; 16] = [
    BFLAGS,
    BLOCK_SIZE,
    BOUNDING_BOX,
    COORDINATES,
    GID,
    INTEGER_RUNTIME_PARAMETERS,
    INTEGER_SCALARS,
    LOGICAL_RUNTIME_PARAMETERS,
    LOGICAL_SCALARS,
    NODE_TYPE,
    REAL_RUNTIME_PARAMETERS,
    REAL_SCALARS,
    REFINE_LEVEL,
    STRING_RUNTIME_PARAMETERS,
    STRING_SCALARS,
    WHICH_CHILD,
];

/// Integer scalar keys.
pub const NXB: &str = "nxb";
pub const NYB: &str = "nyb";
pub const NZB: &str = "nzb";
pub const GLOBAL_NUM_BLOCKS: &str = "globalnumblocks";

/// Columns per `gid` row: six face neighbors, then the relation row.
pub const GID_COLUMNS: usize = NEIGHBOR_COUNT + RELATION_STRIDE;

/// True for per-cell physical datasets (density, pressure, ...).
pub fn is_variable_dataset(name: &str) -> bool {
    !METADATA_DATASETS.contains(&name)
}

/// Metadata of one FLASH snapshot.
#[derive(Debug, Clone)]
pub struct FlashMetadata {
    dims: BlockDims,
    integer_scalars: ScalarTable,
    variables: Vec<String>,
    tree: BlockTree,
}

impl FlashMetadata {
    /// Scan the metadata tables of `source`.
    ///
    /// `integer scalars` and `gid` are required; the other per-block tables
    /// override the attributes derived from the relation encoding when they
    /// are present.
    pub fn read<S: SnapshotSource + ?Sized>(source: &S) -> Result<Self, AmrReduceError> {
        let integer_scalars = source.read_scalar_table(INTEGER_SCALARS)?;
        let dim = |key: &str| -> Result<usize, AmrReduceError> {
            Ok(usize::try_from(integer_scalars.require_int(key)?).unwrap_or(0))
        };
        let dims = BlockDims::new(dim(NXB)?, dim(NYB)?, dim(NZB)?);

        let gid = source.read_ints(GID)?;
        let rows = gid.len() / GID_COLUMNS;
        if gid.len() % GID_COLUMNS != 0 {
            return Err(AmrReduceError::ShapeMismatch {
                dataset: GID.to_string(),
                expected: rows * GID_COLUMNS,
                found: gid.len(),
            });
        }
        let declared = integer_scalars.require_int(GLOBAL_NUM_BLOCKS)?;
        if usize::try_from(declared).ok() != Some(rows) {
            return Err(AmrReduceError::ShapeMismatch {
                dataset: GID.to_string(),
                expected: usize::try_from(declared).unwrap_or(0),
                found: rows,
            });
        }

        let relations: Vec<i32> = gid
            .chunks_exact(GID_COLUMNS)
            .flat_map(|row| row[NEIGHBOR_COUNT..].iter().copied())
            .collect();
        let derived = BlockTree::from_relations(&relations)?;
        let tables = BlockTables::read(source, rows)?;

        let blocks = gid
            .chunks_exact(GID_COLUMNS)
            .zip(derived.blocks())
            .enumerate()
            .map(|(i, (row, base))| tables.assemble(i, row, base))
            .collect::<Result<Vec<_>, _>>()?;
        let tree = BlockTree::with_blocks(blocks, &relations)?;
        if let Err(e) = tree.validate_invariants() {
            log::warn!("block tables disagree with the relation encoding: {e}");
        }

        let variables = source
            .dataset_names()?
            .into_iter()
            .filter(|name| is_variable_dataset(name))
            .collect();

        Ok(Self {
            dims,
            integer_scalars,
            variables,
            tree,
        })
    }

    pub fn block_count(&self) -> usize {
        self.tree.len()
    }

    /// Cells per block (`nxb`, `nyb`, `nzb`).
    pub fn dims(&self) -> BlockDims {
        self.dims
    }

    pub fn integer_scalars(&self) -> &ScalarTable {
        &self.integer_scalars
    }

    /// The integer scalar table with `nxb`, `nyb` and `nzb` halved.
    pub fn reduced_integer_scalars(&self) -> ScalarTable {
        let mut table = self.integer_scalars.clone();
        for key in [NXB, NYB, NZB] {
            table.update_int(key, |v| v / 2);
        }
        table
    }

    /// Names of the variable datasets, sorted.
    pub fn variable_names(&self) -> &[String] {
        &self.variables
    }

    pub fn is_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v == name)
    }

    pub fn tree(&self) -> &BlockTree {
        &self.tree
    }

    pub fn into_tree(self) -> BlockTree {
        self.tree
    }
}

/// Optional per-block attribute tables.
struct BlockTables {
    refine_level: Option<Vec<i32>>,
    node_type: Option<Vec<i32>>,
    which_child: Option<Vec<i32>>,
    bflags: Option<(Vec<i32>, usize)>,
    block_size: Option<(Vec<f32>, usize)>,
    coordinates: Option<Vec<f32>>,
    bounding_box: Option<Vec<f32>>,
}

impl BlockTables {
    fn read<S: SnapshotSource + ?Sized>(source: &S, rows: usize) -> Result<Self, AmrReduceError> {
        Ok(Self {
            refine_level: optional_ints(source, REFINE_LEVEL, rows, 1)?,
            node_type: optional_ints(source, NODE_TYPE, rows, 1)?,
            which_child: optional_ints(source, WHICH_CHILD, rows, 1)?,
            bflags: optional_rows(source, BFLAGS, rows, |s, n| s.read_ints(n))?,
            block_size: optional_rows(source, BLOCK_SIZE, rows, |s, n| s.read_floats(n))?,
            coordinates: optional_rows(source, COORDINATES, rows, |s, n| s.read_floats(n))?
                .map(|(v, width)| expect_width(COORDINATES, v, width, 3))
                .transpose()?,
            bounding_box: optional_rows(source, BOUNDING_BOX, rows, |s, n| s.read_floats(n))?
                .map(|(v, width)| expect_width(BOUNDING_BOX, v, width, 6))
                .transpose()?,
        })
    }

    /// Build block `i` from its `gid` row, overriding `base` with table values.
    fn assemble(&self, i: usize, gid_row: &[i32], base: &Block) -> Result<Block, AmrReduceError> {
        let mut neighbors = [0i32; NEIGHBOR_COUNT];
        neighbors.copy_from_slice(&gid_row[..NEIGHBOR_COUNT]);

        let mut builder = Block::builder(BlockId::from_index(i)?)
            .refine_level(base.refine_level())
            .node_type(base.node_type())
            .which_child(base.which_child().map_or(-1, i32::from))
            .neighbors(neighbors);
        if let Some(levels) = &self.refine_level {
            builder = builder.refine_level(u8::try_from(levels[i]).unwrap_or(u8::MAX));
        }
        if let Some(types) = &self.node_type {
            builder = builder.node_type(NodeType::from_raw(types[i]));
        }
        if let Some(slots) = &self.which_child {
            // FLASH counts octants from 1
            builder = builder.which_child(if slots[i] > 0 { slots[i] - 1 } else { -1 });
        }
        if let Some((flags, width)) = &self.bflags {
            builder = builder.bflags(flags[i * width]);
        }
        if let Some((sizes, width)) = &self.block_size {
            builder = builder.block_size(sizes[i * width]);
        }
        if let Some(coords) = &self.coordinates {
            builder = builder.coordinates([coords[3 * i], coords[3 * i + 1], coords[3 * i + 2]]);
        }
        if let Some(bbox) = &self.bounding_box {
            let b = &bbox[6 * i..6 * i + 6];
            builder = builder.bounding_box([
                (b[1] - b[0]) / 2.0,
                (b[3] - b[2]) / 2.0,
                (b[5] - b[4]) / 2.0,
            ]);
        }
        Ok(builder.build())
    }
}

/// Read a per-block table if present, returning the data and its row width.
fn optional_rows<S, T>(
    source: &S,
    name: &str,
    rows: usize,
    read: impl FnOnce(&S, &str) -> Result<Vec<T>, AmrReduceError>,
) -> Result<Option<(Vec<T>, usize)>, AmrReduceError>
where
    S: SnapshotSource + ?Sized,
{
    if !source.has_dataset(name)? {
        return Ok(None);
    }
    let dims = source.dataset_dims(name)?;
    let width: usize = dims.iter().skip(1).product();
    let data = read(source, name)?;
    if dims.first().copied() != Some(rows) || data.len() != rows * width || width == 0 {
        return Err(AmrReduceError::ShapeMismatch {
            dataset: name.to_string(),
            expected: rows * width.max(1),
            found: data.len(),
        });
    }
    Ok(Some((data, width)))
}

fn optional_ints<S: SnapshotSource + ?Sized>(
    source: &S,
    name: &str,
    rows: usize,
    width: usize,
) -> Result<Option<Vec<i32>>, AmrReduceError> {
    optional_rows(source, name, rows, |s, n| s.read_ints(n))?
        .map(|(v, w)| expect_width(name, v, w, width))
        .transpose()
}

fn expect_width<T>(
    name: &str,
    data: Vec<T>,
    width: usize,
    expected: usize,
) -> Result<Vec<T>, AmrReduceError> {
    if width == expected {
        Ok(data)
    } else {
        let rows = data.len() / width.max(1);
        Err(AmrReduceError::ShapeMismatch {
            dataset: name.to_string(),
            expected: rows * expected,
            found: data.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{Dataset, DatasetData, ScalarValue, Snapshot, SnapshotReader};
    use crate::topology::BlockFace;

    fn scalars(blocks: i32) -> Dataset {
        Dataset::table(
            [
                (NXB, ScalarValue::Int(4)),
                (NYB, ScalarValue::Int(4)),
                (NZB, ScalarValue::Int(2)),
                (GLOBAL_NUM_BLOCKS, ScalarValue::Int(blocks)),
            ]
            .into_iter()
            .collect(),
        )
    }

    fn two_roots() -> Snapshot {
        // two side-by-side root blocks without children
        #[rustfmt::skip]
        let gid = vec![
            -1, 2, -1, -1, -1, -1,   -1, -1, -1, -1, -1, -1, -1, -1, -1,
            1, -1, -1, -1, -1, -1,   -1, -1, -1, -1, -1, -1, -1, -1, -1,
        ];
        Snapshot::new()
            .with(INTEGER_SCALARS, scalars(2))
            .with(GID, Dataset::new(GID, DatasetData::Int(gid), vec![2, GID_COLUMNS]).unwrap())
            .with(
                BOUNDING_BOX,
                Dataset::new(
                    BOUNDING_BOX,
                    DatasetData::Float(vec![0., 1., 0., 1., 0., 1., 1., 2., 0., 1., 0., 1.]),
                    vec![2, 3, 2],
                )
                .unwrap(),
            )
            .with(
                "dens",
                Dataset::new("dens", DatasetData::Float(vec![1.0; 64]), vec![2, 4, 4, 2]).unwrap(),
            )
    }

    #[test]
    fn reads_dims_tree_and_variables() {
        let source = SnapshotReader::from_snapshot(two_roots());
        let meta = FlashMetadata::read(&source).unwrap();
        assert_eq!(meta.block_count(), 2);
        assert_eq!(meta.dims(), BlockDims::new(4, 4, 2));
        assert_eq!(meta.variable_names(), ["dens".to_string()]);
        assert!(!meta.is_variable(GID));

        let b1 = BlockId::new(1).unwrap();
        let b2 = meta.tree().neighbor_of(b1, BlockFace::Right).unwrap();
        assert_eq!(b2.id().get(), 2);
        assert_eq!(b2.bounding_box(), [0.5, 0.5, 0.5]);
        assert_eq!(meta.tree().roots().count(), 2);
    }

    #[test]
    fn halves_spatial_scalars_only() {
        let source = SnapshotReader::from_snapshot(two_roots());
        let reduced = FlashMetadata::read(&source).unwrap().reduced_integer_scalars();
        assert_eq!(reduced.get_int(NXB), Some(2));
        assert_eq!(reduced.get_int(NZB), Some(1));
        assert_eq!(reduced.get_int(GLOBAL_NUM_BLOCKS), Some(2));
    }

    #[test]
    fn block_count_must_match_gid() {
        let snap = two_roots().with(INTEGER_SCALARS, scalars(3));
        let err = FlashMetadata::read(&SnapshotReader::from_snapshot(snap)).unwrap_err();
        assert_eq!(
            err,
            AmrReduceError::ShapeMismatch {
                dataset: GID.into(),
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn missing_dimension_scalar() {
        let table = Dataset::table([(GLOBAL_NUM_BLOCKS, ScalarValue::Int(2))].into_iter().collect());
        let snap = two_roots().with(INTEGER_SCALARS, table);
        assert_eq!(
            FlashMetadata::read(&SnapshotReader::from_snapshot(snap)).unwrap_err(),
            AmrReduceError::MissingScalar(NXB.into())
        );
    }
}
