//! The shock endpoint.

use std::sync::Arc;

use axum::extract::Query;
use axum::{Extension, Json};
use serde::Deserialize;

use climate_common::{ClimateError, ClimateResult};
use country_mask::SpatialAgg;
use shock::{Basis, Mode, ShockRequest, ShockResponse, Stat};

use crate::error::ApiError;
use crate::state::AppState;

/// Years the archive covers; requests outside are rejected up front.
const MIN_YEAR: i32 = 2015;
const MAX_YEAR: i32 = 2100;

fn default_mode() -> String {
    "baseline".to_string()
}

fn default_q() -> f64 {
    0.95
}

fn default_basis() -> String {
    "ensemble2015".to_string()
}

fn default_agg() -> String {
    "median".to_string()
}

fn default_stat() -> String {
    "ratio".to_string()
}

fn default_build_reference() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ShockParams {
    /// ISO2 country code.
    pub region: String,
    pub scenario: String,
    /// Projection window, inclusive.
    pub start: i32,
    pub end: i32,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_q")]
    pub q: f64,
    #[serde(default = "default_basis")]
    pub basis: String,
    #[serde(default = "default_agg")]
    pub agg: String,
    #[serde(default = "default_stat")]
    pub stat: String,
    #[serde(default = "default_build_reference")]
    pub build_reference: bool,
}

impl ShockParams {
    fn into_request(self) -> ClimateResult<ShockRequest> {
        let region = self.region.trim().to_ascii_uppercase();
        if region.len() != 2 || !region.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ClimateError::invalid_parameter(
                "region",
                format!("expected an ISO2 country code, got '{}'", self.region),
            ));
        }
        for (name, year) in [("start", self.start), ("end", self.end)] {
            if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
                return Err(ClimateError::invalid_parameter(
                    name,
                    format!("year must be in [{}, {}], got {}", MIN_YEAR, MAX_YEAR, year),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.q) {
            return Err(ClimateError::invalid_parameter(
                "q",
                format!("quantile must be in [0, 1], got {}", self.q),
            ));
        }

        Ok(ShockRequest {
            region,
            scenario: self.scenario,
            window: (self.start, self.end),
            mode: Mode::parse(&self.mode)?,
            q: self.q,
            basis: Basis::parse(&self.basis)?,
            agg: parse_agg(&self.agg)?,
            stat: Stat::parse(&self.stat)?,
            build_reference: self.build_reference,
        })
    }
}

fn parse_agg(s: &str) -> ClimateResult<SpatialAgg> {
    match s.to_ascii_lowercase().as_str() {
        "mean" => Ok(SpatialAgg::Mean),
        "median" => Ok(SpatialAgg::Median),
        other => Err(ClimateError::invalid_parameter(
            "agg",
            format!("expected 'mean' or 'median', got '{}'", other),
        )),
    }
}

/// Compute a regional shock.
pub async fn shock_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ShockParams>,
) -> Result<Json<ShockResponse>, ApiError> {
    let request = params.into_request()?;
    let catalog = state.require_catalog().await?;
    let mask = state.require_mask().await?;

    let response = state
        .engine
        .compute_region_shock(&catalog, &mask, &request)
        .await?;
    Ok(Json(response))
}
