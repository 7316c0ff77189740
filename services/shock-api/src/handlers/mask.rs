//! Country mask endpoints: ensure (build or reuse) and alignment check.

use std::sync::Arc;

use axum::extract::Query;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use country_mask::{fetch_geojson, parse_countries, CountryMask};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EnsureParams {
    /// Rebuild even when a cached mask exists.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct EnsureResponse {
    pub countries: usize,
    pub assigned_cells: usize,
    pub rebuilt: bool,
}

/// Build the country mask if missing (or forced), else reuse the cached
/// artifact.
pub async fn ensure_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<EnsureParams>,
) -> Result<Json<EnsureResponse>, ApiError> {
    if !params.force {
        if let Some(mask) = state.mask.read().await.clone() {
            return Ok(Json(summary(&mask, false)));
        }
        if CountryMask::exists(&state.cache_dir) {
            let mask = Arc::new(CountryMask::load(&state.cache_dir)?);
            let resp = summary(&mask, false);
            *state.mask.write().await = Some(mask);
            return Ok(Json(resp));
        }
    }

    let geojson = fetch_geojson(&state.config.boundaries_url).await?;
    let countries = parse_countries(&geojson)?;
    // Rasterization walks every cell against every polygon; keep it off
    // the async runtime.
    let mask = tokio::task::spawn_blocking(move || CountryMask::build(&countries))
        .await
        .map_err(|e| {
            climate_common::ClimateError::InternalError(format!("Mask build task failed: {}", e))
        })?;
    mask.save(&state.cache_dir)?;

    let mask = Arc::new(mask);
    let resp = summary(&mask, true);
    *state.mask.write().await = Some(mask);
    info!(
        countries = resp.countries,
        cells = resp.assigned_cells,
        "Country mask built"
    );
    Ok(Json(resp))
}

fn summary(mask: &CountryMask, rebuilt: bool) -> EnsureResponse {
    EnsureResponse {
        countries: mask.countries.len(),
        assigned_cells: mask.cells.iter().filter(|&&c| c >= 0).count(),
        rebuilt,
    }
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub aligned: bool,
    pub countries: usize,
    pub assigned_cells: usize,
    /// Countries with zero assigned cells (too small for the 1-degree
    /// grid).
    pub empty_countries: Vec<String>,
}

/// Verify the cached mask against the canonical grid and report coverage.
pub async fn check_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<CheckResponse>, ApiError> {
    let mask = state.require_mask().await?;
    mask.check_alignment()?;

    let coverage = mask.coverage();
    let empty_countries: Vec<String> = coverage
        .iter()
        .filter(|(_, n)| *n == 0)
        .map(|(c, _)| c.clone())
        .collect();

    Ok(Json(CheckResponse {
        aligned: true,
        countries: mask.countries.len(),
        assigned_cells: coverage.iter().map(|(_, n)| n).sum(),
        empty_countries,
    }))
}
