//! Reference (threshold) maps: per-cell ensemble statistics for the
//! scenario's reference year, cached as JSON artifacts.
//!
//! One artifact carries both the baseline field (member median) and the
//! quantile field at its `q`, so either shock mode can be answered from
//! the same cached map. Artifacts are keyed
//! `thrmap_{basis}_{scenario}_q{q:.2}`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use climate_common::{
    CanonicalField, ClimateError, ClimateResult, TimeReduction, N_LAT, N_LON,
};
use ensemble::{quantile, reduce_stack, EnsembleStack, ReduceOp};

/// The year all reference maps are computed for.
pub const REFERENCE_YEAR: i32 = 2015;

/// Ensemble basis a reference map is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Basis {
    /// Full scenario ensemble, reference year 2015.
    Ensemble2015,
}

impl Basis {
    pub fn parse(s: &str) -> ClimateResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ensemble2015" => Ok(Basis::Ensemble2015),
            other => Err(ClimateError::InvalidBasis(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Basis::Ensemble2015 => "ensemble2015",
        }
    }
}

/// Cached per-cell reference statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdMap {
    pub basis: Basis,
    pub scenario: String,
    /// Quantile the `quantile` field was computed at.
    pub q: f64,
    /// Members that survived normalization.
    pub n_members: usize,
    /// Distinct models among the surviving members.
    pub n_models: usize,
    /// Surviving member keys ("model/run"), in stack order.
    pub members: Vec<String>,
    /// Dropped-member errors from the build, truncated.
    pub errors: Vec<String>,
    /// Member median per cell, lat-major 180x360.
    pub baseline: Vec<f64>,
    /// Member quantile(q) per cell, lat-major 180x360.
    pub quantile: Vec<f64>,
}

/// Distribution summary of one map field, for diagnostics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThresholdSummary {
    pub min: f64,
    pub p50: f64,
    pub max: f64,
    pub n_finite: usize,
}

impl ThresholdMap {
    /// Compute both reference fields from a reference-year stack.
    pub fn from_stack(stack: &EnsembleStack, basis: Basis, scenario: &str, q: f64) -> Self {
        let baseline = reduce_stack(stack, ReduceOp::Median);
        let quantile_field = reduce_stack(stack, ReduceOp::Quantile(q));
        Self {
            basis,
            scenario: scenario.to_string(),
            q,
            n_members: stack.len(),
            n_models: stack.n_models(),
            members: stack.member_names(),
            errors: stack.errors.iter().take(5).cloned().collect(),
            baseline: baseline.data,
            quantile: quantile_field.data,
        }
    }

    /// The reference field for baseline-mode shocks.
    pub fn baseline_field(&self) -> CanonicalField {
        CanonicalField::from_data(self.baseline.clone(), TimeReduction::Year(REFERENCE_YEAR))
    }

    /// The reference field for percentile-mode shocks.
    pub fn quantile_field(&self) -> CanonicalField {
        CanonicalField::from_data(self.quantile.clone(), TimeReduction::Year(REFERENCE_YEAR))
    }

    /// Summary statistics over the finite cells of a map field.
    pub fn summarize(values: &[f64]) -> ThresholdSummary {
        let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        finite.sort_by(|a, b| a.partial_cmp(b).unwrap());
        if finite.is_empty() {
            return ThresholdSummary {
                min: f64::NAN,
                p50: f64::NAN,
                max: f64::NAN,
                n_finite: 0,
            };
        }
        ThresholdSummary {
            min: finite[0],
            p50: quantile(&finite, 0.5),
            max: finite[finite.len() - 1],
            n_finite: finite.len(),
        }
    }

    fn validate(&self) -> ClimateResult<()> {
        if self.baseline.len() != N_LAT * N_LON || self.quantile.len() != N_LAT * N_LON {
            return Err(ClimateError::AlignmentMismatch(format!(
                "threshold map has {} cells, expected {}",
                self.baseline.len(),
                N_LAT * N_LON
            )));
        }
        Ok(())
    }
}

/// Artifact store for threshold maps in the cache directory.
pub struct ThresholdStore {
    cache_dir: PathBuf,
}

impl ThresholdStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Artifact path for a (basis, scenario, q) key.
    pub fn artifact_path(&self, basis: Basis, scenario: &str, q: f64) -> PathBuf {
        self.cache_dir.join(format!(
            "thrmap_{}_{}_q{:.2}.json",
            basis.as_str(),
            scenario.to_ascii_lowercase(),
            q
        ))
    }

    pub fn exists(&self, basis: Basis, scenario: &str, q: f64) -> bool {
        self.artifact_path(basis, scenario, q).exists()
    }

    pub fn save(&self, map: &ThresholdMap) -> ClimateResult<PathBuf> {
        let path = self.artifact_path(map.basis, &map.scenario, map.q);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(map)?)
            .map_err(|e| ClimateError::CacheError(format!("Failed to write {:?}: {}", tmp, e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| ClimateError::CacheError(format!("Failed to replace {:?}: {}", path, e)))?;
        info!(path = ?path, "Threshold map cached");
        Ok(path)
    }

    /// Load a cached map; `MissingReferenceMap` when absent.
    pub fn load(&self, basis: Basis, scenario: &str, q: f64) -> ClimateResult<ThresholdMap> {
        let path = self.artifact_path(basis, scenario, q);
        if !path.exists() {
            return Err(ClimateError::MissingReferenceMap(format!(
                "{}/{}/q{:.2}",
                basis.as_str(),
                scenario,
                q
            )));
        }
        let bytes = std::fs::read(&path)
            .map_err(|e| ClimateError::CacheError(format!("Failed to read {:?}: {}", path, e)))?;
        let map: ThresholdMap = serde_json::from_slice(&bytes)?;
        map.validate()?;
        Ok(map)
    }
}
