//! Per-dataset reduction policies.
//!
//! Most variable datasets are reduced on their own with the configured
//! statistical strategy. Derived quantities such as temperature are instead
//! combined octant by octant with a second dataset of the same block. The
//! choice is a lookup by dataset name, so the statistical and the physical
//! process are the same orchestration with different tables.

use super::reducer::OCTANT;
use std::collections::BTreeMap;

/// Combines an octant of the reduced dataset with the matching octant of the
/// auxiliary dataset. `None` means the auxiliary octant cannot be used; the
/// caller then takes the plain mean of the primary octant.
pub type CombineFn = fn(&[f32; OCTANT], &[f32; OCTANT]) -> Option<f32>;

/// Name of the temperature dataset in FLASH output.
pub const TEMPERATURE: &str = "temp";
/// Name of the density dataset in FLASH output.
pub const DENSITY: &str = "dens";

/// How one variable dataset is reduced.
#[derive(Debug, Clone)]
pub enum ReductionPolicy {
    /// Reduce the dataset alone with the statistical strategy.
    Standard,
    /// Combine the dataset with `auxiliary` through `combine` (float only).
    Composite {
        auxiliary: String,
        combine: CombineFn,
    },
}

/// Dataset name → policy; names not listed use [`ReductionPolicy::Standard`].
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    composites: BTreeMap<String, ReductionPolicy>,
}

impl PolicyTable {
    /// Every dataset reduced statistically.
    pub fn statistical() -> Self {
        Self::default()
    }

    /// Temperature mixed by density, everything else statistical.
    pub fn physical() -> Self {
        Self::default().with_composite(TEMPERATURE, DENSITY, density_weighted_mean)
    }

    /// Register a composite reduction for `dataset`.
    pub fn with_composite(mut self, dataset: &str, auxiliary: &str, combine: CombineFn) -> Self {
        self.composites.insert(
            dataset.to_string(),
            ReductionPolicy::Composite {
                auxiliary: auxiliary.to_string(),
                combine,
            },
        );
        self
    }

    pub fn policy_for(&self, dataset: &str) -> &ReductionPolicy {
        self.composites
            .get(dataset)
            .unwrap_or(&ReductionPolicy::Standard)
    }

    pub fn is_statistical(&self) -> bool {
        self.composites.is_empty()
    }
}

/// Weighted mean `Σ vᵢwᵢ / Σ wᵢ`, e.g. the mixing temperature of eight cells
/// weighted by their density. `None` when the weights sum to zero or are not
/// finite.
pub fn density_weighted_mean(values: &[f32; OCTANT], weights: &[f32; OCTANT]) -> Option<f32> {
    let total: f64 = weights.iter().map(|&w| f64::from(w)).sum();
    if total == 0.0 || !total.is_finite() {
        return None;
    }
    let weighted: f64 = values
        .iter()
        .zip(weights)
        .map(|(&v, &w)| f64::from(v) * f64::from(w))
        .sum();
    Some((weighted / total) as f32)
}
