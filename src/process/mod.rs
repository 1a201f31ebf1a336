//! Whole-file reduction.
//!
//! [`ReductionProcess`] turns one FLASH snapshot into a half-resolution copy:
//!
//! 1. read the metadata and rebuild the block tree,
//! 2. copy every metadata dataset except `integer scalars` unchanged,
//! 3. write `integer scalars` with `nxb`, `nyb`, `nzb` halved,
//! 4. reduce each requested variable dataset block by block into one
//!    flattened buffer and write it once, with `minimum`/`maximum`
//!    attributes.
//!
//! The per-dataset policy table decides whether a dataset is reduced on its
//! own or combined with an auxiliary dataset, so the statistical and the
//! physical strategy share this single orchestration.

pub mod buffer;
pub mod config;

pub use buffer::OutputBuffer;
pub use config::{ReductionConfig, ReductionConfigBuilder, ReductionStrategy};

use crate::amr_error::AmrReduceError;
use crate::io::flash::{FlashMetadata, INTEGER_SCALARS};
use crate::io::{ElementKind, SnapshotReader, SnapshotSink, SnapshotSource, SnapshotWriter};
use crate::reduce::{
    CellValue, CombineFn, PolicyTable, ReductionPolicy, StatisticalDatasetReducer,
    StatisticalReducer, mean,
};
use crate::topology::BlockTree;
use itertools::Itertools;
use log::Level;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Suffix appended to the input file name.
pub const OUTPUT_SUFFIX: &str = "_reduced";

/// Reduces snapshot files with one configuration.
#[derive(Debug, Clone)]
pub struct ReductionProcess {
    config: ReductionConfig,
    reducer: Arc<dyn StatisticalReducer>,
    policies: PolicyTable,
}

/// What a single snapshot reduction produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReductionSummary {
    pub blocks: usize,
    /// Variable datasets written, in request order.
    pub reduced: Vec<String>,
    /// Metadata datasets copied unchanged.
    pub copied: Vec<String>,
    /// Variable datasets left out because they were not requested.
    pub dropped: Vec<String>,
}

/// Outcome of [`ReductionProcess::reduce_batch`].
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Output paths of the files reduced successfully.
    pub reduced: Vec<PathBuf>,
    /// One [`AmrReduceError::FileFailed`] per failed file.
    pub failed: Vec<AmrReduceError>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.reduced.len() + self.failed.len()
    }
}

/// Borrowed state for one snapshot.
struct FileContext<'a, S: ?Sized> {
    source: &'a S,
    tree: &'a BlockTree,
    engine: &'a StatisticalDatasetReducer,
    output_dims: [usize; 4],
}

#[cfg(feature = "rayon")]
enum ReducedDataset {
    Int(OutputBuffer<i32>),
    Float(OutputBuffer<f32>),
}

impl ReductionProcess {
    /// Create the target directory if missing and bind the strategy.
    pub fn new(config: ReductionConfig) -> Result<Self, AmrReduceError> {
        fs::create_dir_all(&config.target_directory)?;
        let reducer = config.strategy.reducer_kind().build();
        let policies = config.strategy.policies();
        Ok(Self {
            config,
            reducer,
            policies,
        })
    }

    /// Replace the policy table chosen by the strategy.
    pub fn with_policies(mut self, policies: PolicyTable) -> Self {
        self.policies = policies;
        self
    }

    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    /// `<target>/<file name>_reduced`.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let mut name = input
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(OUTPUT_SUFFIX);
        self.config.target_directory.join(name)
    }

    fn progress_level(&self) -> Level {
        if self.config.verbose {
            Level::Info
        } else {
            Level::Debug
        }
    }

    /// Reduce one snapshot file into the target directory and return the
    /// path of the new file. Nothing is written if the reduction fails.
    pub fn reduce_file<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf, AmrReduceError> {
        let path = path.as_ref();
        let started = Instant::now();
        let mut source = SnapshotReader::open(path)?;
        let output = self.output_path(path);
        let mut sink = SnapshotWriter::create(&output)?;

        let summary = self.reduce_snapshot(&source, &mut sink)?;
        source.close()?;
        sink.close()?;

        log::info!(
            "Reduced {} ({} blocks, {} datasets) to {} in {:.2?}",
            path.display(),
            summary.blocks,
            summary.reduced.len(),
            output.display(),
            started.elapsed()
        );
        Ok(output)
    }

    /// Reduce every file in order. Failures are logged and collected; the
    /// remaining files are still processed.
    pub fn reduce_batch<I, P>(&self, files: I) -> BatchReport
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let files: Vec<PathBuf> = files
            .into_iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect();
        let total = files.len();
        let mut report = BatchReport::default();

        for (i, file) in files.iter().enumerate() {
            if self.config.verbose {
                let mb = fs::metadata(file)
                    .map(|m| m.len() as f64 / (1024.0 * 1024.0))
                    .unwrap_or(0.0);
                log::info!("({}/{}) {} ({mb:.2} MB)", i + 1, total, file.display());
            } else {
                log::info!("({}/{}) {}", i + 1, total, file.display());
            }
            match self.reduce_file(file) {
                Ok(output) => report.reduced.push(output),
                Err(e) => {
                    log::error!("An error occurred while processing {}: {e}", file.display());
                    report.failed.push(AmrReduceError::FileFailed {
                        path: file.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        log::info!(
            "Finished: {} of {} files reduced, {} failed",
            report.reduced.len(),
            total,
            report.failed.len()
        );
        report
    }

    /// Reduce the snapshot behind `source` into `sink`.
    ///
    /// Requested names are validated before anything is written. The sink is
    /// left open.
    pub fn reduce_snapshot<S, W>(
        &self,
        source: &S,
        sink: &mut W,
    ) -> Result<ReductionSummary, AmrReduceError>
    where
        S: SnapshotSource + Sync + ?Sized,
        W: SnapshotSink,
    {
        let meta = FlashMetadata::read(source)?;
        log::log!(self.progress_level(), "Blocks: {}", meta.block_count());

        let engine = StatisticalDatasetReducer::new(meta.dims(), Arc::clone(&self.reducer))?;
        let requested = self.requested_datasets(&meta)?;
        self.check_auxiliaries(source, &requested)?;

        let dropped: Vec<String> = meta
            .variable_names()
            .iter()
            .filter(|name| !requested.contains(name))
            .cloned()
            .collect();
        if !dropped.is_empty() {
            log::warn!(
                "Not requested, left out of the output: {}",
                dropped.iter().join(", ")
            );
        }

        let mut copied = Vec::new();
        for name in source.dataset_names()? {
            if !meta.is_variable(&name) && name != INTEGER_SCALARS {
                sink.copy_dataset(source, &name)?;
                copied.push(name);
            }
        }
        sink.write_scalar_table(INTEGER_SCALARS, &meta.reduced_integer_scalars())?;

        let reduced_dims = engine.reduced_dims();
        let ctx = FileContext {
            source,
            tree: meta.tree(),
            engine: &engine,
            output_dims: [
                meta.block_count(),
                reduced_dims.x,
                reduced_dims.y,
                reduced_dims.z,
            ],
        };
        self.reduce_datasets(&ctx, &requested, sink)?;

        Ok(ReductionSummary {
            blocks: meta.block_count(),
            reduced: requested,
            copied,
            dropped,
        })
    }

    /// The configured names, or every variable dataset when none are given.
    fn requested_datasets(&self, meta: &FlashMetadata) -> Result<Vec<String>, AmrReduceError> {
        if self.config.reduces_all_datasets() {
            return Ok(meta.variable_names().to_vec());
        }
        self.config
            .datasets
            .iter()
            .unique()
            .map(|name| {
                if meta.is_variable(name) {
                    Ok(name.clone())
                } else {
                    Err(AmrReduceError::DatasetNotFound(name.clone()))
                }
            })
            .collect()
    }

    fn check_auxiliaries<S>(&self, source: &S, requested: &[String]) -> Result<(), AmrReduceError>
    where
        S: SnapshotSource + ?Sized,
    {
        for name in requested {
            if let ReductionPolicy::Composite { auxiliary, .. } = self.policies.policy_for(name) {
                if !source.has_dataset(auxiliary)? {
                    return Err(AmrReduceError::MissingAuxiliary {
                        dataset: name.clone(),
                        auxiliary: auxiliary.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn reduce_datasets<S, W>(
        &self,
        ctx: &FileContext<'_, S>,
        names: &[String],
        sink: &mut W,
    ) -> Result<(), AmrReduceError>
    where
        S: SnapshotSource + Sync + ?Sized,
        W: SnapshotSink,
    {
        #[cfg(feature = "rayon")]
        {
            if self.config.parallel && names.len() > 1 {
                return self.reduce_parallel(ctx, names, sink);
            }
        }
        self.reduce_sequential(ctx, names, sink)
    }

    /// One buffer per element type, reused across datasets.
    fn reduce_sequential<S, W>(
        &self,
        ctx: &FileContext<'_, S>,
        names: &[String],
        sink: &mut W,
    ) -> Result<(), AmrReduceError>
    where
        S: SnapshotSource + ?Sized,
        W: SnapshotSink,
    {
        let mut ints = OutputBuffer::<i32>::new();
        let mut floats = OutputBuffer::<f32>::new();
        for name in names {
            match ctx.source.element_kind(name)? {
                ElementKind::Int => {
                    self.reduce_into(ctx, name, &mut ints)?;
                    write_buffer(sink, name, &ints, &ctx.output_dims)?;
                }
                ElementKind::Float => {
                    self.reduce_into(ctx, name, &mut floats)?;
                    write_buffer(sink, name, &floats, &ctx.output_dims)?;
                }
                kind => return Err(unsupported(name, kind)),
            }
        }
        Ok(())
    }

    /// Each worker owns its buffers; writes happen afterwards, in request
    /// order, through the single sink.
    #[cfg(feature = "rayon")]
    fn reduce_parallel<S, W>(
        &self,
        ctx: &FileContext<'_, S>,
        names: &[String],
        sink: &mut W,
    ) -> Result<(), AmrReduceError>
    where
        S: SnapshotSource + Sync + ?Sized,
        W: SnapshotSink,
    {
        let reduced = names
            .par_iter()
            .map(|name| -> Result<ReducedDataset, AmrReduceError> {
                match ctx.source.element_kind(name)? {
                    ElementKind::Int => {
                        let mut buffer = OutputBuffer::<i32>::new();
                        self.reduce_into(ctx, name, &mut buffer)?;
                        Ok(ReducedDataset::Int(buffer))
                    }
                    ElementKind::Float => {
                        let mut buffer = OutputBuffer::<f32>::new();
                        self.reduce_into(ctx, name, &mut buffer)?;
                        Ok(ReducedDataset::Float(buffer))
                    }
                    kind => Err(unsupported(name, kind)),
                }
            })
            .collect::<Result<Vec<_>, AmrReduceError>>()?;

        for (name, dataset) in names.iter().zip(reduced) {
            match dataset {
                ReducedDataset::Int(buffer) => write_buffer(sink, name, &buffer, &ctx.output_dims)?,
                ReducedDataset::Float(buffer) => {
                    write_buffer(sink, name, &buffer, &ctx.output_dims)?
                }
            }
        }
        Ok(())
    }

    /// Reduce every block of `name` into `buffer` according to its policy.
    fn reduce_into<T, S>(
        &self,
        ctx: &FileContext<'_, S>,
        name: &str,
        buffer: &mut OutputBuffer<T>,
    ) -> Result<(), AmrReduceError>
    where
        T: CellValue,
        S: SnapshotSource + ?Sized,
    {
        log::log!(self.progress_level(), "Reducing dataset {name}");
        buffer.reset(ctx.tree.len(), ctx.engine.reduced_cells());

        match self.policies.policy_for(name) {
            ReductionPolicy::Standard => {
                for block in ctx.tree.blocks() {
                    let id = block.id();
                    let flat = T::read_block(ctx.source, name, id)?;
                    buffer.fill_block(id.index(), |out| {
                        ctx.engine.reduce_block_into(id, &flat, out)
                    })?;
                }
                Ok(())
            }
            ReductionPolicy::Composite { auxiliary, combine } => {
                if T::KIND != ElementKind::Float {
                    return Err(unsupported(name, T::KIND));
                }
                let aux_kind = ctx.source.element_kind(auxiliary)?;
                if aux_kind != ElementKind::Float {
                    return Err(unsupported(auxiliary, aux_kind));
                }
                self.combine_into(ctx, name, auxiliary, *combine, buffer)
            }
        }
    }

    /// Octant-wise combination of `name` with `auxiliary` (float datasets).
    fn combine_into<T, S>(
        &self,
        ctx: &FileContext<'_, S>,
        name: &str,
        auxiliary: &str,
        combine: CombineFn,
        buffer: &mut OutputBuffer<T>,
    ) -> Result<(), AmrReduceError>
    where
        T: CellValue,
        S: SnapshotSource + ?Sized,
    {
        let mut degenerate = 0usize;
        let mut combined = vec![0.0f32; ctx.engine.reduced_cells()];
        for block in ctx.tree.blocks() {
            let id = block.id();
            let primary = ctx.source.read_block_floats(name, id)?;
            let weights = ctx.source.read_block_floats(auxiliary, id)?;
            ctx.engine.combine_block_into(
                id,
                &primary,
                Some(&weights[..]),
                &mut combined,
                |v, w| {
                    combine(v, w).unwrap_or_else(|| {
                        degenerate += 1;
                        mean(&v[..])
                    })
                },
            )?;
            buffer.fill_block(id.index(), |out| {
                for (dst, &src) in out.iter_mut().zip(&combined) {
                    *dst = T::from_average(f64::from(src));
                }
                Ok(())
            })?;
        }
        if degenerate > 0 {
            log::warn!(
                "{name}: {degenerate} octants could not be combined with {auxiliary}, used the plain mean"
            );
        }
        Ok(())
    }
}

fn unsupported(name: &str, kind: ElementKind) -> AmrReduceError {
    AmrReduceError::UnsupportedType {
        dataset: name.to_string(),
        kind,
    }
}

fn write_buffer<T, W>(
    sink: &mut W,
    name: &str,
    buffer: &OutputBuffer<T>,
    dims: &[usize],
) -> Result<(), AmrReduceError>
where
    T: CellValue,
    W: SnapshotSink,
{
    T::write_flat(sink, name, buffer.as_slice(), dims, &buffer.attributes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_name_appends_suffix() {
        let dir = std::env::temp_dir();
        let process = ReductionConfig::builder()
            .target_directory(&dir)
            .build()
            .unwrap();
        assert_eq!(
            process.output_path(Path::new("/data/sedov_hdf5_chk_0001")),
            dir.join("sedov_hdf5_chk_0001_reduced")
        );
    }

    #[test]
    fn physical_strategy_selects_physical_policies() {
        let process = ReductionConfig::builder()
            .target_directory(std::env::temp_dir())
            .strategy(ReductionStrategy::PhysicalMedian)
            .build()
            .unwrap();
        assert!(matches!(
            process.policies().policy_for("temp"),
            ReductionPolicy::Composite { .. }
        ));
        let process = process.with_policies(PolicyTable::statistical());
        assert!(process.policies().is_statistical());
    }
}
