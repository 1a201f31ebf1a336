//! Reduction settings and their builder.

use super::ReductionProcess;
use crate::amr_error::AmrReduceError;
use crate::reduce::{PolicyTable, ReducerKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Strategy selected for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionStrategy {
    Mean,
    #[default]
    Median,
    /// Mean, with temperature mixed by density.
    PhysicalMean,
    /// Median, with temperature mixed by density.
    PhysicalMedian,
}

impl ReductionStrategy {
    pub const ALL: [ReductionStrategy; 4] = [
        ReductionStrategy::Mean,
        ReductionStrategy::Median,
        ReductionStrategy::PhysicalMean,
        ReductionStrategy::PhysicalMedian,
    ];

    /// Statistical reducer used for every non-composite dataset.
    pub fn reducer_kind(self) -> ReducerKind {
        match self {
            ReductionStrategy::Mean | ReductionStrategy::PhysicalMean => ReducerKind::Mean,
            ReductionStrategy::Median | ReductionStrategy::PhysicalMedian => ReducerKind::Median,
        }
    }

    pub fn is_physical(self) -> bool {
        matches!(
            self,
            ReductionStrategy::PhysicalMean | ReductionStrategy::PhysicalMedian
        )
    }

    pub fn policies(self) -> PolicyTable {
        if self.is_physical() {
            PolicyTable::physical()
        } else {
            PolicyTable::statistical()
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReductionStrategy::Mean => "mean",
            ReductionStrategy::Median => "median",
            ReductionStrategy::PhysicalMean => "physicalmean",
            ReductionStrategy::PhysicalMedian => "physicalmedian",
        }
    }
}

impl fmt::Display for ReductionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReductionStrategy {
    type Err = AmrReduceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name() == wanted)
            .ok_or_else(|| AmrReduceError::UnknownStrategy(s.to_string()))
    }
}

/// Settings shared by every file of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Directory the `<name>_reduced` files are written to.
    pub target_directory: PathBuf,
    pub strategy: ReductionStrategy,
    /// Variable datasets to reduce; empty means all of them.
    pub datasets: Vec<String>,
    /// Log dataset progress at `info` instead of `debug`.
    pub verbose: bool,
    /// Reduce the datasets of a file concurrently (needs the `rayon` feature).
    pub parallel: bool,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            target_directory: PathBuf::from("."),
            strategy: ReductionStrategy::default(),
            datasets: Vec::new(),
            verbose: false,
            parallel: true,
        }
    }
}

impl ReductionConfig {
    pub fn builder() -> ReductionConfigBuilder {
        ReductionConfigBuilder::default()
    }

    pub fn reduces_all_datasets(&self) -> bool {
        self.datasets.is_empty()
    }
}

/// Fluent construction of a [`ReductionProcess`].
#[derive(Debug, Clone, Default)]
pub struct ReductionConfigBuilder {
    config: ReductionConfig,
}

impl ReductionConfigBuilder {
    pub fn strategy(mut self, strategy: ReductionStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Reduce only the named variable datasets.
    pub fn datasets<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.datasets = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn reduce_all_datasets(mut self) -> Self {
        self.config.datasets.clear();
        self
    }

    pub fn target_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.target_directory = dir.into();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    /// Create the target directory if needed and return the process.
    pub fn build(self) -> Result<ReductionProcess, AmrReduceError> {
        ReductionProcess::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names_parse_case_insensitively() {
        for strategy in ReductionStrategy::ALL {
            let upper = strategy.name().to_uppercase();
            assert_eq!(upper.parse::<ReductionStrategy>().unwrap(), strategy);
        }
        assert_eq!(
            "average".parse::<ReductionStrategy>(),
            Err(AmrReduceError::UnknownStrategy("average".into()))
        );
    }

    #[test]
    fn physical_strategies_keep_the_statistical_reducer() {
        assert_eq!(ReductionStrategy::PhysicalMean.reducer_kind(), ReducerKind::Mean);
        assert!(ReductionStrategy::PhysicalMedian.is_physical());
        assert!(ReductionStrategy::Median.policies().is_statistical());
        assert!(!ReductionStrategy::PhysicalMedian.policies().is_statistical());
    }

    #[test]
    fn config_serde_uses_lowercase_and_defaults() {
        let cfg: ReductionConfig =
            serde_json::from_str(r#"{"strategy":"physicalmean","datasets":["temp"]}"#).unwrap();
        assert_eq!(cfg.strategy, ReductionStrategy::PhysicalMean);
        assert_eq!(cfg.datasets, vec!["temp".to_string()]);
        assert_eq!(cfg.target_directory, PathBuf::from("."));
        assert!(cfg.parallel);
        assert!(!cfg.reduces_all_datasets());
    }

    #[test]
    fn builder_sets_every_field() {
        let b = ReductionConfig::builder()
            .strategy(ReductionStrategy::Mean)
            .datasets(["dens", "pres"])
            .target_directory("out")
            .verbose(true)
            .parallel(false);
        assert_eq!(b.config().datasets.len(), 2);
        let b = b.reduce_all_datasets();
        assert!(b.config().reduces_all_datasets());
        assert!(b.config().verbose);
        assert!(!b.config().parallel);
    }
}
