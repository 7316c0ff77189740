//! Rasterization of country boundaries onto the canonical grid, and the
//! persisted mask artifact.
//!
//! Every cell center is tested against the boundary polygons in feature
//! order and assigned to the first country containing it, so contested
//! coastal cells resolve deterministically. The result is cached as a
//! JSON artifact carrying its own grid axes; on load the axes must match
//! the canonical grid exactly (1e-6 tolerance) or the mask is rejected.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use climate_common::{CanonicalGrid, ClimateError, ClimateResult, N_LAT, N_LON};

use crate::geojson::CountryShape;

/// Mask artifact file name inside the cache directory.
const MASK_FILE: &str = "country_mask.json";

/// Grid-axis tolerance for accepting a cached mask.
pub const ALIGNMENT_TOL: f64 = 1e-6;

/// Country assignment for every canonical cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryMask {
    /// Latitude cell centers the mask was built on.
    pub lat: Vec<f64>,
    /// Longitude cell centers the mask was built on.
    pub lon: Vec<f64>,
    /// ISO2 codes, indexed by the values in `cells`.
    pub countries: Vec<String>,
    /// Per-cell country index, lat-major; -1 marks ocean / unassigned.
    pub cells: Vec<i32>,
}

impl CountryMask {
    /// Rasterize boundaries onto the canonical grid.
    pub fn build(countries: &[CountryShape]) -> Self {
        let grid = CanonicalGrid::new();

        let cells: Vec<i32> = (0..N_LAT * N_LON)
            .into_par_iter()
            .map(|cell| {
                let lat = grid.lat[cell / N_LON];
                let lon = grid.lon[cell % N_LON];
                // Boundaries use -180..180 longitudes.
                let lon = if lon > 180.0 { lon - 360.0 } else { lon };
                countries
                    .iter()
                    .position(|c| c.polygons.iter().any(|p| p.contains(lon, lat)))
                    .map(|i| i as i32)
                    .unwrap_or(-1)
            })
            .collect();

        let assigned = cells.iter().filter(|&&c| c >= 0).count();
        info!(
            countries = countries.len(),
            assigned_cells = assigned,
            "Country mask rasterized"
        );

        Self {
            lat: grid.lat,
            lon: grid.lon,
            countries: countries.iter().map(|c| c.iso2.clone()).collect(),
            cells,
        }
    }

    /// Verify the mask's axes against the canonical grid.
    pub fn check_alignment(&self) -> ClimateResult<()> {
        let grid = CanonicalGrid::new();
        match grid.max_abs_diff(&self.lat, &self.lon) {
            Some(diff) if diff <= ALIGNMENT_TOL => Ok(()),
            Some(diff) => Err(ClimateError::AlignmentMismatch(format!(
                "max axis deviation {:.2e} exceeds {:.0e}",
                diff, ALIGNMENT_TOL
            ))),
            None => Err(ClimateError::AlignmentMismatch(format!(
                "mask is {}x{}, expected {}x{}",
                self.lat.len(),
                self.lon.len(),
                N_LAT,
                N_LON
            ))),
        }
    }

    /// Flat cell indices assigned to a country.
    pub fn region_cells(&self, iso2: &str) -> ClimateResult<Vec<usize>> {
        let iso2 = iso2.to_ascii_uppercase();
        let idx = self
            .countries
            .iter()
            .position(|c| *c == iso2)
            .ok_or_else(|| ClimateError::UnknownRegion(iso2.clone()))? as i32;
        Ok(self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == idx)
            .map(|(i, _)| i)
            .collect())
    }

    /// Per-country cell counts, for the mask diagnostics endpoint.
    pub fn coverage(&self) -> Vec<(String, usize)> {
        let mut counts = vec![0usize; self.countries.len()];
        for &c in &self.cells {
            if c >= 0 {
                counts[c as usize] += 1;
            }
        }
        self.countries
            .iter()
            .cloned()
            .zip(counts)
            .collect()
    }

    pub fn artifact_path(cache_dir: &Path) -> PathBuf {
        cache_dir.join(MASK_FILE)
    }

    /// Persist the mask artifact, replacing any previous one.
    pub fn save(&self, cache_dir: &Path) -> ClimateResult<()> {
        let path = Self::artifact_path(cache_dir);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(self)?)
            .map_err(|e| ClimateError::CacheError(format!("Failed to write mask: {}", e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| ClimateError::CacheError(format!("Failed to replace mask: {}", e)))?;
        Ok(())
    }

    /// Load a cached mask and verify its alignment.
    pub fn load(cache_dir: &Path) -> ClimateResult<Self> {
        let path = Self::artifact_path(cache_dir);
        let bytes = std::fs::read(&path)
            .map_err(|e| ClimateError::CacheError(format!("Failed to read mask: {}", e)))?;
        let mask: Self = serde_json::from_slice(&bytes)?;
        mask.check_alignment()?;
        Ok(mask)
    }

    /// Whether a cached artifact exists.
    pub fn exists(cache_dir: &Path) -> bool {
        Self::artifact_path(cache_dir).exists()
    }
}
